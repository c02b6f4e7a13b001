use std::sync::Arc;

use alloy_primitives::U64;
use async_trait::async_trait;
use clmock_types::{
    aliases::{BlockNumber, BlockNumberOrTag, Bytes, TxHash},
    engine_api::ExecutionBlock,
};
use color_eyre::eyre;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::trace;

use super::EthRpc;
use crate::{
    ExecutionError,
    engine_api::capabilities::{
        ETH_BLOCK_NUMBER, ETH_GET_BLOCK_BY_NUMBER, ETH_REQUEST_TIMEOUT, ETH_SEND_RAW_TRANSACTION,
    },
    transport::{JsonRpcRequest, Transport},
};

/// [`EthRpc`] over a plain JSON-RPC transport.
pub struct JsonRpcEthClient {
    transport: Arc<dyn Transport>,
}

impl JsonRpcEthClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self { transport: Arc::new(transport) }
    }

    async fn rpc_request<D: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> eyre::Result<D> {
        let req = JsonRpcRequest::new(method, params);
        let resp = tokio::time::timeout(ETH_REQUEST_TIMEOUT, self.transport.send(&req))
            .await
            .map_err(|_| ExecutionError::Transport(format!("{method} timed out")))??;

        trace!(method, ?resp, "eth rpc response");

        let result = resp.into_result()?;
        serde_json::from_value(result)
            .map_err(|e| ExecutionError::InvalidResponse(format!("{method}: {e}")).into())
    }
}

#[async_trait]
impl EthRpc for JsonRpcEthClient {
    async fn block_number(&self) -> eyre::Result<BlockNumber> {
        let number: U64 = self.rpc_request(ETH_BLOCK_NUMBER, json!([])).await?;
        Ok(number.to())
    }

    async fn get_block_by_number(
        &self,
        block_number: BlockNumberOrTag,
    ) -> eyre::Result<Option<ExecutionBlock>> {
        let return_full_transaction_objects = false;
        self.rpc_request(
            ETH_GET_BLOCK_BY_NUMBER,
            json!([block_number, return_full_transaction_objects]),
        )
        .await
    }

    async fn send_raw_transaction(&self, tx: Bytes) -> eyre::Result<TxHash> {
        self.rpc_request(ETH_SEND_RAW_TRANSACTION, json!([tx])).await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;
    use crate::transport::mock::{MockReply, MockTransport};

    fn client_with(transport: MockTransport) -> (JsonRpcEthClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        (JsonRpcEthClient { transport: transport.clone() }, transport)
    }

    #[tokio::test]
    async fn block_number_decodes_hex_quantity() {
        let (client, transport) = client_with(MockTransport::new());
        transport.push_response(ETH_BLOCK_NUMBER, MockReply::Result(json!("0x1b"))).await;

        assert_eq!(client.block_number().await.unwrap(), 27);
    }

    #[tokio::test]
    async fn unknown_block_is_none() {
        let (client, transport) = client_with(MockTransport::new());
        transport.push_response(ETH_GET_BLOCK_BY_NUMBER, MockReply::Result(json!(null))).await;

        let block = client.get_block_by_number(BlockNumberOrTag::Number(99)).await.unwrap();
        assert!(block.is_none());

        let requests = transport.requests().await;
        assert_eq!(requests[0].1, json!(["0x63", false]));
    }

    #[tokio::test]
    async fn latest_block_carries_total_difficulty() {
        let (client, transport) = client_with(MockTransport::new());
        transport
            .push_response(
                ETH_GET_BLOCK_BY_NUMBER,
                MockReply::Result(json!({
                    "hash": B256::repeat_byte(1),
                    "number": "0x5",
                    "parentHash": B256::repeat_byte(2),
                    "timestamp": "0x10",
                    "totalDifficulty": "0x400",
                })),
            )
            .await;

        let block = client.get_block_by_number(BlockNumberOrTag::Latest).await.unwrap().unwrap();
        assert_eq!(block.block_number, 5);
        assert_eq!(block.total_difficulty, Some(alloy_primitives::U256::from(0x400)));
        assert_eq!(transport.requests().await[0].1, json!(["latest", false]));
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let (client, transport) = client_with(MockTransport::new());
        transport
            .push_response(ETH_BLOCK_NUMBER, MockReply::TransportError("connection refused".into()))
            .await;

        let err = client.block_number().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
