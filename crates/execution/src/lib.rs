//! Execution-client capability set for the consensus-layer mock.
//!
//! An [`ExecutionClient`] bundles an Engine API client (forkchoice updates, payload building and
//! execution) with a plain eth JSON-RPC client (chain queries and transaction submission).

pub mod client;
pub mod config;
pub mod engine_api;
pub mod error;
pub mod eth_rpc;
pub mod transport;

pub use client::ExecutionClient;
pub use config::{EngineApiEndpoint, ExecutionConfig};
pub use engine_api::EngineApi;
pub use error::ExecutionError;
pub use eth_rpc::EthRpc;
