#![allow(missing_docs)]

use thiserror::Error;

/// Classifies failures talking to an execution client.
///
/// Trait methods across the crate return `eyre::Result`; this enum is the typed payload inside
/// those reports so callers can still downcast and match on the failure kind.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON-RPC error (code {code}): {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Block {0} not found")]
    BlockNotFound(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
