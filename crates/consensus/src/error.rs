use std::time::Duration;

use alloy_rpc_types_engine::PayloadId;
use clmock_types::aliases::{B256, BlockNumber};
use thiserror::Error;

/// Source error of a failed RPC call, converted from the `eyre::Report` returned by the client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Environment faults that abort block production.
///
/// Clients disagreeing with the mocker (non-`VALID` statuses) are not errors; they are logged
/// and the cycle carries on.
#[derive(Debug, Error)]
pub enum MockerError {
    #[error("could not get total difficulty from {client}")]
    DifficultyQuery {
        client: String,
        #[source]
        source: BoxError,
    },

    #[error("could not get block number from {client}")]
    BlockNumberQuery {
        client: String,
        #[source]
        source: BoxError,
    },

    #[error("could not get block header from {client}")]
    HeaderQuery {
        client: String,
        #[source]
        source: BoxError,
    },

    #[error("could not send forkchoiceUpdated to {client}")]
    ForkchoiceUpdated {
        client: String,
        #[source]
        source: BoxError,
    },

    #[error("{client} returned no payload id for the build request")]
    MissingPayloadId { client: String },

    #[error("could not get payload {payload_id:?} from {client}")]
    GetPayload {
        client: String,
        payload_id: PayloadId,
        #[source]
        source: BoxError,
    },

    #[error("could not send transaction through {client}")]
    SendTransaction {
        client: String,
        #[source]
        source: BoxError,
    },

    #[error("no client caught up with block {number} ({hash}) within {timeout:?}")]
    NoEligibleProposer { number: BlockNumber, hash: B256, timeout: Duration },

    #[error("none of the clients accepted payload {number} ({hash})")]
    PayloadNotAccepted { number: BlockNumber, hash: B256 },

    #[error("terminal total difficulty has not been reached")]
    TerminalNotReached,

    #[error("the mocker has already been started")]
    AlreadyStarted,

    #[error("block production has halted")]
    Halted,
}
