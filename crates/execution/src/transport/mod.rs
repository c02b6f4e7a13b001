#![allow(missing_docs)]

pub mod http;
pub mod ipc;
#[cfg(test)]
pub(crate) mod mock;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A generic transport for sending JSON-RPC requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a JSON-RPC request and returns the response.
    async fn send(&self, req: &JsonRpcRequest) -> eyre::Result<JsonRpcResponse>;

    /// Short label used in logs, e.g. `http` or `ipc`.
    fn kind(&self) -> &'static str;
}

/// Represents a JSON-RPC request object.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Represents a JSON-RPC response object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    pub id: u64,
}

/// Represents a JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// Unwraps the `result` member, turning an `error` member into a classified error.
    pub fn into_result(self) -> Result<serde_json::Value, crate::ExecutionError> {
        if let Some(err) = self.error {
            return Err(crate::ExecutionError::JsonRpc { code: err.code, message: err.message });
        }
        // `null` is a legitimate result (e.g. an unknown block) and decodes as an absent member.
        Ok(self.result.unwrap_or(serde_json::Value::Null))
    }
}
