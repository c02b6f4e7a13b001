//! Fan-out of Engine API calls to every registered client.
//!
//! A client failing or disagreeing never aborts the broadcast; each outcome is returned to
//! the caller in registry order.

use std::sync::Arc;

use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadStatus,
};
use clmock_execution::ExecutionClient;
use clmock_types::engine_api::is_valid;
use color_eyre::eyre;
use futures::future::join_all;
use tracing::warn;

/// Result of one client's part in a broadcast.
#[derive(Debug)]
pub struct ClientOutcome<T> {
    /// Name of the client the call went to.
    pub client: String,
    /// The client's answer, or the transport or RPC error.
    pub result: eyre::Result<T>,
}

impl<T> ClientOutcome<T> {
    /// Whether the client answered at all.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl ClientOutcome<PayloadStatus> {
    /// Whether the client executed the payload and found it `VALID`.
    pub fn is_valid(&self) -> bool {
        self.result.as_ref().is_ok_and(|status| is_valid(&status.status))
    }
}

impl ClientOutcome<ForkchoiceUpdated> {
    pub fn is_valid(&self) -> bool {
        self.result.as_ref().is_ok_and(|fcu| is_valid(&fcu.payload_status.status))
    }
}

/// Sends `engine_newPayload` with `payload` to every client concurrently.
pub async fn broadcast_new_payload(
    clients: &[Arc<ExecutionClient>],
    payload: &ExecutionPayloadV1,
) -> Vec<ClientOutcome<PayloadStatus>> {
    join_all(clients.iter().map(|client| async move {
        ClientOutcome {
            client: client.name().to_string(),
            result: client.new_payload(payload.clone()).await,
        }
    }))
    .await
}

/// Sends `engine_forkchoiceUpdated` with `state` and optional `attributes` to every client
/// concurrently.
pub async fn broadcast_forkchoice_updated(
    clients: &[Arc<ExecutionClient>],
    state: &ForkchoiceState,
    attributes: Option<&PayloadAttributes>,
) -> Vec<ClientOutcome<ForkchoiceUpdated>> {
    join_all(clients.iter().map(|client| async move {
        ClientOutcome {
            client: client.name().to_string(),
            result: client.forkchoice_updated(state.clone(), attributes.cloned()).await,
        }
    }))
    .await
}

/// Logs every client that failed or did not answer `VALID` to `engine_newPayload`.
pub(crate) fn log_new_payload_outcomes(
    outcomes: &[ClientOutcome<PayloadStatus>],
    payload: &ExecutionPayloadV1,
) {
    for outcome in outcomes {
        match &outcome.result {
            Err(e) => warn!(
                client = %outcome.client,
                number = payload.block_number,
                hash = %payload.block_hash,
                error = %e,
                "Could not send newPayload"
            ),
            Ok(status) if !is_valid(&status.status) => warn!(
                client = %outcome.client,
                number = payload.block_number,
                hash = %payload.block_hash,
                status = ?status.status,
                "Payload not accepted"
            ),
            Ok(_) => {}
        }
    }
}

/// Logs every client that failed or did not answer `VALID` to `engine_forkchoiceUpdated`.
pub(crate) fn log_forkchoice_outcomes(
    outcomes: &[ClientOutcome<ForkchoiceUpdated>],
    pointer: &str,
    state: &ForkchoiceState,
) {
    for outcome in outcomes {
        match &outcome.result {
            Err(e) => warn!(
                client = %outcome.client,
                pointer,
                head = %state.head_block_hash,
                error = %e,
                "Could not send forkchoiceUpdated"
            ),
            Ok(fcu) if !is_valid(&fcu.payload_status.status) => warn!(
                client = %outcome.client,
                pointer,
                head = %state.head_block_hash,
                status = ?fcu.payload_status.status,
                "Forkchoice update not accepted"
            ),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use clmock_test_support::MockExecutionNode;
    use clmock_types::engine_api::forkchoice_at;

    use super::*;

    #[tokio::test]
    async fn failing_client_does_not_abort_broadcast() {
        let nodes = ["a", "b", "c"].map(|n| MockExecutionNode::with_difficulty(n, 0));
        nodes[1].set_fail_rpc(true);
        let clients: Vec<_> = nodes.iter().map(|n| n.client()).collect();
        let state = forkchoice_at(nodes[0].head().block_hash);

        let outcomes = broadcast_forkchoice_updated(&clients, &state, None).await;

        let names: Vec<_> = outcomes.iter().map(|o| o.client.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(outcomes[0].is_valid());
        assert!(!outcomes[1].is_ok());
        assert!(outcomes[2].is_valid());
        assert_eq!(nodes[2].forkchoice_updates(), vec![state]);
    }

    #[tokio::test]
    async fn empty_registry_yields_no_outcomes() {
        let state = ForkchoiceState::default();
        assert!(broadcast_forkchoice_updated(&[], &state, None).await.is_empty());
    }
}
