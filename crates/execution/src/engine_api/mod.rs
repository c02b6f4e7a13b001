pub mod capabilities;
pub mod client;
pub mod jwt;

use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId,
    PayloadStatus,
};
use async_trait::async_trait;
use color_eyre::eyre;

/// The Engine API calls the mocker issues, as seen from the consensus side.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// `engine_forkchoiceUpdated`: moves head/safe/finalized and, with attributes, starts a
    /// payload build on top of the new head.
    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> eyre::Result<ForkchoiceUpdated>;

    /// `engine_getPayload`: fetches the payload started by a previous forkchoice update.
    async fn get_payload(&self, payload_id: PayloadId) -> eyre::Result<ExecutionPayloadV1>;

    /// `engine_newPayload`: asks the client to execute and validate a payload.
    async fn new_payload(&self, payload: ExecutionPayloadV1) -> eyre::Result<PayloadStatus>;
}
