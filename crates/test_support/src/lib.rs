//! Shared helpers used by clmock's integration and unit tests.
//!
//! The main export is [`MockExecutionNode`], an in-memory execution client that speaks the
//! mocker's capability set so block production can be exercised without real clients.

pub mod node;

pub use node::{MockExecutionNode, genesis_block};
