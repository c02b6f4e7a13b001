use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId,
    PayloadStatus,
};
use clmock_types::{
    aliases::{BlockNumber, BlockNumberOrTag, Bytes, TxHash, U256},
    engine_api::ExecutionBlock,
};
use color_eyre::eyre;
use tracing::debug;

use crate::{
    ExecutionError,
    config::{EngineApiEndpoint, ExecutionConfig},
    engine_api::{EngineApi, client::EngineApiClient},
    eth_rpc::{EthRpc, client::JsonRpcEthClient},
    transport::{http::HttpTransport, ipc::IpcTransport},
};

/// Handle to one execution client: the capability set the mocker drives.
///
/// Engine API calls go through the currently active engine transport; [`cycle_transport`]
/// rotates to the next configured one so reconnect paths on the client side get exercised.
/// Handles are compared by identity, so they are shared as `Arc<ExecutionClient>` and never
/// cloned.
///
/// [`cycle_transport`]: ExecutionClient::cycle_transport
pub struct ExecutionClient {
    name: String,
    engines: Vec<Arc<dyn EngineApi>>,
    active: AtomicUsize,
    eth: Arc<dyn EthRpc>,
}

impl ExecutionClient {
    /// Builds a client from configuration, one engine transport per configured endpoint.
    pub fn new(config: ExecutionConfig) -> eyre::Result<Self> {
        if config.engine_api_endpoints.is_empty() {
            return Err(eyre::eyre!("client {} has no Engine API endpoint", config.name));
        }

        let engines = config
            .engine_api_endpoints
            .into_iter()
            .map(|endpoint| -> Arc<dyn EngineApi> {
                match endpoint {
                    EngineApiEndpoint::Http(url) => {
                        let transport = HttpTransport::new(url).with_jwt(config.jwt_secret);
                        Arc::new(EngineApiClient::new(transport))
                    }
                    EngineApiEndpoint::Ipc(path) => {
                        Arc::new(EngineApiClient::new(IpcTransport::new(path)))
                    }
                }
            })
            .collect();

        let eth: Arc<dyn EthRpc> =
            Arc::new(JsonRpcEthClient::new(HttpTransport::new(config.eth1_rpc_url)));

        Ok(Self { name: config.name, engines, active: AtomicUsize::new(0), eth })
    }

    /// Assembles a client from already constructed capability implementations.
    pub fn from_parts(
        name: impl Into<String>,
        engine: Arc<dyn EngineApi>,
        eth: Arc<dyn EthRpc>,
    ) -> Self {
        Self { name: name.into(), engines: vec![engine], active: AtomicUsize::new(0), eth }
    }

    /// Adds another engine transport to rotate to on [`ExecutionClient::cycle_transport`].
    pub fn with_engine(mut self, engine: Arc<dyn EngineApi>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Engine API implementation currently in use.
    pub fn engine(&self) -> Arc<dyn EngineApi> {
        let idx = self.active.load(Ordering::Acquire) % self.engines.len();
        self.engines[idx].clone()
    }

    pub fn eth(&self) -> &dyn EthRpc {
        self.eth.as_ref()
    }

    /// Switches to the next engine transport. A no-op for clients with a single transport.
    pub fn cycle_transport(&self) {
        if self.engines.len() < 2 {
            return;
        }
        let previous = self.active.fetch_add(1, Ordering::AcqRel);
        debug!(
            client = %self.name,
            transport = (previous + 1) % self.engines.len(),
            "Switched Engine API transport"
        );
    }

    /// Index of the active engine transport.
    pub fn active_transport(&self) -> usize {
        self.active.load(Ordering::Acquire) % self.engines.len()
    }

    /// Total difficulty reported for the client's latest block.
    pub async fn total_difficulty(&self) -> eyre::Result<U256> {
        let block = self.header_by_number(BlockNumberOrTag::Latest).await?;
        block.total_difficulty.ok_or_else(|| {
            ExecutionError::InvalidResponse(format!(
                "block {} has no totalDifficulty",
                block.block_number
            ))
            .into()
        })
    }

    /// Header at `number`; an unknown block is an error.
    pub async fn header_by_number(&self, number: BlockNumberOrTag) -> eyre::Result<ExecutionBlock> {
        self.eth
            .get_block_by_number(number)
            .await?
            .ok_or_else(|| ExecutionError::BlockNotFound(number.to_string()).into())
    }

    pub async fn block_number(&self) -> eyre::Result<BlockNumber> {
        self.eth.block_number().await
    }

    pub async fn send_raw_transaction(&self, tx: Bytes) -> eyre::Result<TxHash> {
        self.eth.send_raw_transaction(tx).await
    }

    pub async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> eyre::Result<ForkchoiceUpdated> {
        self.engine().forkchoice_updated(state, payload_attributes).await
    }

    pub async fn get_payload(&self, payload_id: PayloadId) -> eyre::Result<ExecutionPayloadV1> {
        self.engine().get_payload(payload_id).await
    }

    pub async fn new_payload(&self, payload: ExecutionPayloadV1) -> eyre::Result<PayloadStatus> {
        self.engine().new_payload(payload).await
    }
}

impl fmt::Debug for ExecutionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionClient")
            .field("name", &self.name)
            .field("engines", &self.engines.len())
            .field("active", &self.active_transport())
            .finish()
    }
}
