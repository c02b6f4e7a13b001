//! A programmable transport for testing the JSON-RPC clients.

use std::collections::HashMap;

use async_trait::async_trait;
use color_eyre::eyre::{self, eyre};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Transport};

/// What the mock answers for a given method.
#[derive(Debug)]
pub(crate) enum MockReply {
    Result(Value),
    RpcError { code: i64, message: String },
    TransportError(String),
}

/// A mock transport that can be programmed with expected responses for testing.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<String, MockReply>>,
    // Every request seen, in order, as (method, params).
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Programs the reply for the next call to `method`.
    pub(crate) async fn push_response(&self, method: &str, reply: MockReply) {
        self.responses.lock().await.insert(method.to_string(), reply);
    }

    pub(crate) async fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &JsonRpcRequest) -> eyre::Result<JsonRpcResponse> {
        self.requests.lock().await.push((request.method.clone(), request.params.clone()));
        let reply = self.responses.lock().await.remove(&request.method);

        let response = |result, error| JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result,
            error,
        };

        match reply {
            Some(MockReply::Result(result)) => Ok(response(Some(result), None)),
            Some(MockReply::RpcError { code, message }) => {
                Ok(response(None, Some(JsonRpcError { code, message })))
            }
            Some(MockReply::TransportError(msg)) => Err(eyre!(msg)),
            None => Err(eyre!("MockTransport: unexpected call to method '{}'", request.method)),
        }
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}
