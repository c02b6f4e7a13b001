//! One production cycle per block: select a proposer, build, execute, then move head, safe
//! and finalized to the new block.

use std::{sync::Arc, time::Duration};

use alloy_rpc_types_engine::{ForkchoiceState, PayloadAttributes};
use clmock_execution::ExecutionClient;
use clmock_types::{
    aliases::{B256, BlockNumber, BlockNumberOrTag},
    engine_api::{ExecutionBlock, is_valid},
};
use rand::{Rng, rngs::StdRng};
use tracing::{debug, info, trace, warn};

use crate::{
    broadcast::{
        broadcast_forkchoice_updated, broadcast_new_payload, log_forkchoice_outcomes,
        log_new_payload_outcomes,
    },
    checkpoint::{Checkpoint, GateKeeper},
    error::MockerError,
    mocker::ClMocker,
};

/// The single task producing blocks. Owns the checkpoint guards and the seeded rng.
pub(crate) struct Driver<'a> {
    pub(crate) mocker: &'a ClMocker,
    gates: GateKeeper,
    pub(crate) rng: StdRng,
}

impl<'a> Driver<'a> {
    pub(crate) fn new(mocker: &'a ClMocker, gates: GateKeeper, rng: StdRng) -> Self {
        Self { mocker, gates, rng }
    }

    /// Detects the terminal block, then produces a block every production period until
    /// shutdown.
    pub(crate) async fn drive(&mut self) -> Result<(), MockerError> {
        if !self.detect_terminal().await? {
            return Ok(());
        }
        while self.sleep(self.mocker.config.block_production_period()).await {
            self.produce_block().await?;
        }
        Ok(())
    }

    pub(crate) fn halt(&mut self) {
        self.gates.drain();
    }

    /// Sleeps for `period`. Returns `false` if shutdown was requested in the meantime.
    pub(crate) async fn sleep(&self, period: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.mocker.shutdown.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }

    /// Runs one production cycle. Returns `false` when no block was produced because the
    /// mocker is stopping or no client is registered.
    pub(crate) async fn produce_block(&mut self) -> Result<bool, MockerError> {
        let mocker = self.mocker;
        if mocker.shutdown.is_cancelled() {
            return Ok(false);
        }

        let clients = mocker.registry.lock().await;
        if clients.is_empty() {
            warn!("No execution clients registered, skipping block production");
            return Ok(false);
        }
        let finalized =
            mocker.state.read().latest_header.clone().ok_or(MockerError::TerminalNotReached)?;
        let number = finalized.block_number + 1;

        let proposer = self.select_proposer(&clients, &finalized).await?;
        debug!(client = proposer.name(), number, "Selected block producer");
        mocker.state.write().next_block_producer = Some(proposer.clone());
        self.gates.pass(Checkpoint::PayloadBuild, &mocker.shutdown).await;

        let mut random = [0u8; 32];
        self.rng.fill(&mut random);
        let random = B256::from(random);
        let (forkchoice, fee_recipient) = {
            let state = mocker.state.read();
            (state.forkchoice.clone(), state.next_fee_recipient)
        };
        let attributes = PayloadAttributes {
            timestamp: finalized.timestamp + 1,
            prev_randao: random,
            suggested_fee_recipient: fee_recipient,
            withdrawals: None,
            parent_beacon_block_root: None,
        };

        let response =
            proposer.forkchoice_updated(forkchoice, Some(attributes)).await.map_err(|e| {
                MockerError::ForkchoiceUpdated { client: proposer.name().to_string(), source: e.into() }
            })?;
        if !is_valid(&response.payload_status.status) {
            warn!(
                client = proposer.name(),
                number,
                status = ?response.payload_status.status,
                "Build request not accepted"
            );
        }
        let payload_id = response
            .payload_id
            .ok_or_else(|| MockerError::MissingPayloadId { client: proposer.name().to_string() })?;

        let payload = proposer.get_payload(payload_id).await.map_err(|e| {
            MockerError::GetPayload {
                client: proposer.name().to_string(),
                payload_id,
                source: e.into(),
            }
        })?;
        mocker.state.write().latest_payload_built = Some(payload.clone());
        self.gates.pass(Checkpoint::GetPayload, &mocker.shutdown).await;

        let outcomes = broadcast_new_payload(&clients, &payload).await;
        log_new_payload_outcomes(&outcomes, &payload);
        {
            let mut state = mocker.state.write();
            state.latest_executed_payload = Some(payload.clone());
            state.history.record_payload(payload.block_number, payload.clone());
        }
        self.gates.pass(Checkpoint::ExecutePayload, &mocker.shutdown).await;

        let hash = payload.block_hash;
        self.advance_forkchoice(&clients, "head", |fc| fc.head_block_hash = hash).await;
        self.gates.pass(Checkpoint::HeadForkchoice, &mocker.shutdown).await;

        self.advance_forkchoice(&clients, "safe", |fc| fc.safe_block_hash = hash).await;
        self.gates.pass(Checkpoint::SafeForkchoice, &mocker.shutdown).await;

        self.advance_forkchoice(&clients, "finalized", |fc| fc.finalized_block_hash = hash).await;

        {
            let mut state = mocker.state.write();
            state.history.record_random(number, random);
            if state.first_transition_block.is_none() {
                info!(number, "First block produced through the Engine API");
                state.first_transition_block = Some(number);
            }
        }
        let header = finalized_header(&clients, number)
            .await
            .ok_or(MockerError::PayloadNotAccepted { number, hash })?;
        if header.block_hash != hash {
            warn!(number, expected = %hash, actual = %header.block_hash, "Finalized header differs from payload");
        }
        mocker.state.write().latest_header = Some(header);

        for client in clients.iter() {
            client.cycle_transport();
        }
        drop(clients);

        info!(number, %hash, client = proposer.name(), "Produced block");
        self.gates.pass(Checkpoint::FinalizedForkchoice, &mocker.shutdown).await;
        Ok(true)
    }

    /// Draws random clients until one is at the finalized block.
    async fn select_proposer(
        &mut self,
        clients: &[Arc<ExecutionClient>],
        finalized: &ExecutionBlock,
    ) -> Result<Arc<ExecutionClient>, MockerError> {
        let timeout = self.mocker.config.proposer_selection_timeout();
        let retry_delay = self.mocker.config.proposer_retry_delay();

        let search = async {
            loop {
                let candidate = &clients[self.rng.gen_range(0..clients.len())];
                if is_caught_up(candidate, finalized).await? {
                    return Ok::<_, MockerError>(candidate.clone());
                }
                tokio::time::sleep(retry_delay).await;
            }
        };

        tokio::time::timeout(timeout, search).await.map_err(|_| {
            MockerError::NoEligibleProposer {
                number: finalized.block_number,
                hash: finalized.block_hash,
                timeout,
            }
        })?
    }

    /// Moves one forkchoice pointer and tells every client.
    async fn advance_forkchoice(
        &self,
        clients: &[Arc<ExecutionClient>],
        pointer: &'static str,
        update: impl FnOnce(&mut ForkchoiceState),
    ) {
        let state = {
            let mut state = self.mocker.state.write();
            update(&mut state.forkchoice);
            state.forkchoice.clone()
        };
        let outcomes = broadcast_forkchoice_updated(clients, &state, None).await;
        log_forkchoice_outcomes(&outcomes, pointer, &state);
    }
}

/// Whether `client`'s latest block is the finalized block.
async fn is_caught_up(
    client: &ExecutionClient,
    finalized: &ExecutionBlock,
) -> Result<bool, MockerError> {
    let number = client.block_number().await.map_err(|e| MockerError::BlockNumberQuery {
        client: client.name().to_string(),
        source: e.into(),
    })?;
    if number != finalized.block_number {
        trace!(client = client.name(), number, expected = finalized.block_number, "Candidate not synced");
        return Ok(false);
    }

    let header = client.header_by_number(BlockNumberOrTag::Number(number)).await.map_err(|e| {
        MockerError::HeaderQuery { client: client.name().to_string(), source: e.into() }
    })?;
    if header.block_hash != finalized.block_hash {
        trace!(client = client.name(), number, hash = %header.block_hash, "Candidate on another chain");
        return Ok(false);
    }
    Ok(true)
}

/// Header at `number` from the first client that has it.
async fn finalized_header(
    clients: &[Arc<ExecutionClient>],
    number: BlockNumber,
) -> Option<ExecutionBlock> {
    for client in clients {
        match client.header_by_number(BlockNumberOrTag::Number(number)).await {
            Ok(header) => return Some(header),
            Err(e) => debug!(client = client.name(), number, error = %e, "Block not available"),
        }
    }
    None
}
