#![allow(missing_docs)]
use std::{fmt, sync::Arc, time::Duration};

use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId,
    PayloadStatus,
};
use async_trait::async_trait;
use color_eyre::eyre;
use serde::{Serialize, de::DeserializeOwned};

use super::{EngineApi, capabilities::*};
use crate::{
    ExecutionError,
    transport::{JsonRpcRequest, Transport},
};

/// JSON-RPC implementation of [`EngineApi`] over any [`Transport`].
pub struct EngineApiClient {
    transport: Arc<dyn Transport>,
}

impl EngineApiClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self { transport: Arc::new(transport) }
    }

    /// Label of the underlying transport, for logs.
    pub fn transport_kind(&self) -> &'static str {
        self.transport.kind()
    }

    async fn request<P, R>(&self, method: &str, params: P, timeout: Duration) -> eyre::Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let req = JsonRpcRequest::new(method, serde_json::to_value(params)?);

        let resp = tokio::time::timeout(timeout, self.transport.send(&req))
            .await
            .map_err(|_| ExecutionError::Transport(format!("{method} timed out after {timeout:?}")))??;

        let res = resp.into_result()?;
        serde_json::from_value(res)
            .map_err(|e| ExecutionError::InvalidResponse(format!("{method}: {e}")).into())
    }
}

impl fmt::Debug for EngineApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApiClient").field("transport", &self.transport.kind()).finish()
    }
}

#[async_trait]
impl EngineApi for EngineApiClient {
    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> eyre::Result<ForkchoiceUpdated> {
        self.request(
            ENGINE_FORKCHOICE_UPDATED_V1,
            (state, payload_attributes),
            ENGINE_FORKCHOICE_UPDATED_TIMEOUT,
        )
        .await
    }

    async fn get_payload(&self, payload_id: PayloadId) -> eyre::Result<ExecutionPayloadV1> {
        self.request(ENGINE_GET_PAYLOAD_V1, (payload_id,), ENGINE_GET_PAYLOAD_TIMEOUT).await
    }

    async fn new_payload(&self, payload: ExecutionPayloadV1) -> eyre::Result<PayloadStatus> {
        self.request(ENGINE_NEW_PAYLOAD_V1, (payload,), ENGINE_NEW_PAYLOAD_TIMEOUT).await
    }
}
