//! The consensus-layer mock.
//!
//! [`ClMocker`] waits for the execution clients it drives to cross the terminal total
//! difficulty, then produces one block per cycle through the Engine API: it picks a caught-up
//! proposer, asks it to build a payload, has every client execute it and finally moves head,
//! safe and finalized to the new block. Test logic can pause the mocker at six
//! [`Checkpoint`]s inside each cycle.

#![allow(missing_docs)]

pub mod broadcast;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod history;
pub mod mocker;
pub mod registry;

mod cycle;
mod terminal;

pub use checkpoint::{Checkpoint, CheckpointPass, Gate};
pub use config::MockerConfig;
pub use error::MockerError;
pub use history::History;
pub use mocker::ClMocker;
pub use registry::ClientRegistry;
