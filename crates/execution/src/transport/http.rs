use std::time::Duration;

use async_trait::async_trait;
use color_eyre::eyre;
use reqwest::Client;
use url::Url;

use super::{JsonRpcRequest, JsonRpcResponse, Transport};
use crate::{ExecutionError, engine_api::jwt::JwtProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC over HTTP, optionally authenticated with an Engine API JWT.
pub struct HttpTransport {
    client: Client,
    url: Url,
    jwt_provider: Option<JwtProvider>,
}

impl HttpTransport {
    pub fn new(url: Url) -> Self {
        Self { client: Client::new(), url, jwt_provider: None }
    }

    pub fn with_jwt(mut self, secret: [u8; 32]) -> Self {
        self.jwt_provider = Some(JwtProvider::new(secret));
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &JsonRpcRequest) -> eyre::Result<JsonRpcResponse> {
        let mut req_builder =
            self.client.post(self.url.clone()).timeout(REQUEST_TIMEOUT).json(request);

        if let Some(provider) = &self.jwt_provider {
            let token = provider.get_token().await?;
            req_builder = req_builder.bearer_auth(token);
        }

        let response = req_builder
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        let response_bytes =
            response.bytes().await.map_err(|e| ExecutionError::Transport(e.to_string()))?;

        serde_json::from_slice(&response_bytes)
            .map_err(|e| ExecutionError::Serialization(e.to_string()).into())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
