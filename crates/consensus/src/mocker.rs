use std::sync::Arc;

use alloy_rpc_types_engine::{ExecutionPayloadV1, ForkchoiceState};
use clmock_execution::ExecutionClient;
use clmock_types::{
    aliases::{Address, B256, BlockNumber, Bytes},
    engine_api::ExecutionBlock,
};
use parking_lot::{Mutex, RwLock};
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    checkpoint::{Checkpoint, Checkpoints, Gate, GateKeeper},
    config::MockerConfig,
    cycle::Driver,
    error::MockerError,
    history::History,
    registry::ClientRegistry,
};

/// Snapshot state written by the driver and read by everyone else.
#[derive(Debug, Default)]
pub(crate) struct MockerState {
    pub(crate) forkchoice: ForkchoiceState,
    /// Finalized tip as last reported by a client. Its number is the height every proposer
    /// candidate has to be at.
    pub(crate) latest_header: Option<ExecutionBlock>,
    pub(crate) latest_payload_built: Option<ExecutionPayloadV1>,
    pub(crate) latest_executed_payload: Option<ExecutionPayloadV1>,
    pub(crate) terminal_reached: bool,
    pub(crate) first_transition_block: Option<BlockNumber>,
    pub(crate) next_block_producer: Option<Arc<ExecutionClient>>,
    pub(crate) next_fee_recipient: Address,
    pub(crate) history: History,
}

/// Consensus-layer mock producing blocks on a dynamic set of execution clients.
///
/// Call [`ClMocker::run`] from one task to drive block production; every other method can be
/// used concurrently from test logic. The mocker can be stopped once and never restarted.
pub struct ClMocker {
    pub(crate) config: MockerConfig,
    pub(crate) registry: ClientRegistry,
    pub(crate) state: RwLock<MockerState>,
    checkpoints: Checkpoints,
    gates: Mutex<Option<GateKeeper>>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) terminal: watch::Sender<bool>,
}

impl ClMocker {
    pub fn new(config: MockerConfig) -> Self {
        let (checkpoints, gates) = Checkpoints::closed();
        Self {
            config,
            registry: ClientRegistry::new(),
            state: RwLock::new(MockerState::default()),
            checkpoints,
            gates: Mutex::new(Some(gates)),
            shutdown: CancellationToken::new(),
            terminal: watch::Sender::new(false),
        }
    }

    /// Waits for the terminal total difficulty, then produces blocks until [`ClMocker::stop`]
    /// is called or an environment fault occurs.
    ///
    /// Every checkpoint is drained before this returns.
    pub async fn run(&self) -> Result<(), MockerError> {
        if self.is_stopped() {
            return Err(MockerError::Halted);
        }
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut driver = self.driver(seed).ok_or(MockerError::AlreadyStarted)?;
        info!(
            seed,
            ttd = %self.config.terminal_total_difficulty,
            period = ?self.config.block_production_period(),
            "Starting consensus-layer mock"
        );

        let result = driver.drive().await;
        driver.halt();
        // A fault ends the run for good, same as an explicit stop.
        self.shutdown.cancel();

        match &result {
            Ok(()) => info!("Block production stopped"),
            Err(e) => warn!(error = %e, "Block production aborted"),
        }
        result
    }

    /// Stops block production at the start of the next cycle and opens every checkpoint.
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        debug!("Stopping consensus-layer mock");
        self.shutdown.cancel();
        // Not started yet: nobody else will ever drain the gates.
        if let Some(mut gates) = self.gates.lock().take() {
            gates.drain();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn driver(&self, seed: u64) -> Option<Driver<'_>> {
        let gates = self.gates.lock().take()?;
        Some(Driver::new(self, gates, StdRng::seed_from_u64(seed)))
    }

    pub async fn register_client(&self, client: Arc<ExecutionClient>) {
        self.registry.register(client).await;
    }

    pub async fn unregister_client(&self, client: &Arc<ExecutionClient>) -> bool {
        self.registry.unregister(client).await
    }

    /// Registered clients. Reads on the registry do not wait for the running cycle.
    pub fn clients(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn checkpoint(&self, checkpoint: Checkpoint) -> &Gate {
        self.checkpoints.get(checkpoint)
    }

    pub fn config(&self) -> &MockerConfig {
        &self.config
    }

    /// Forkchoice last sent to the clients.
    pub fn forkchoice(&self) -> ForkchoiceState {
        self.state.read().forkchoice.clone()
    }

    /// The finalized block as reported by the clients.
    pub fn latest_header(&self) -> Option<ExecutionBlock> {
        self.state.read().latest_header.clone()
    }

    pub fn latest_payload_built(&self) -> Option<ExecutionPayloadV1> {
        self.state.read().latest_payload_built.clone()
    }

    pub fn latest_executed_payload(&self) -> Option<ExecutionPayloadV1> {
        self.state.read().latest_executed_payload.clone()
    }

    pub fn terminal_reached(&self) -> bool {
        self.state.read().terminal_reached
    }

    /// Number of the first block produced through the Engine API.
    pub fn first_transition_block(&self) -> Option<BlockNumber> {
        self.state.read().first_transition_block
    }

    /// Whether block `number` was produced through the Engine API.
    pub fn is_post_transition_block(&self, number: BlockNumber) -> bool {
        self.first_transition_block().is_some_and(|first| first <= number)
    }

    /// `prevRandao` used to build block `number`.
    pub fn random_at(&self, number: BlockNumber) -> Option<B256> {
        self.state.read().history.random(number)
    }

    /// Payload executed at block `number`.
    pub fn payload_at(&self, number: BlockNumber) -> Option<ExecutionPayloadV1> {
        self.state.read().history.payload(number).cloned()
    }

    /// Proposer of the block currently in flight, or of the last block produced.
    pub fn next_block_producer(&self) -> Option<Arc<ExecutionClient>> {
        self.state.read().next_block_producer.clone()
    }

    pub fn next_fee_recipient(&self) -> Address {
        self.state.read().next_fee_recipient
    }

    /// Resolves once the terminal total difficulty has been reached.
    pub async fn wait_for_terminal(&self) -> Result<(), MockerError> {
        let mut terminal = self.terminal.subscribe();
        tokio::select! {
            biased;
            reached = terminal.wait_for(|reached| *reached) => {
                reached.map(|_| ()).map_err(|_| MockerError::Halted)
            }
            _ = self.shutdown.cancelled() => Err(MockerError::Halted),
        }
    }

    /// Waits until `blocks` more production cycles have completed.
    pub async fn produce_blocks(&self, blocks: u64) -> Result<(), MockerError> {
        let gate = self.checkpoint(Checkpoint::FinalizedForkchoice);
        for _ in 0..blocks {
            let pass = gate.wait().await.ok_or(MockerError::Halted)?;
            drop(pass);
        }
        Ok(())
    }

    /// Sets the fee recipient of the next block built by `target`, or of the next block at
    /// all when no target is given.
    ///
    /// Blocks at the [`Checkpoint::PayloadBuild`] checkpoint until `target` is the selected
    /// proposer. `tx` is submitted through the proposer before the build request goes out.
    /// Returns the number of the block the fee recipient applies to.
    pub async fn set_next_fee_recipient(
        &self,
        fee_recipient: Address,
        target: Option<&Arc<ExecutionClient>>,
        tx: Option<Bytes>,
    ) -> Result<BlockNumber, MockerError> {
        let gate = self.checkpoint(Checkpoint::PayloadBuild);
        loop {
            let pass = gate.wait().await.ok_or(MockerError::Halted)?;
            let (producer, finalized) = {
                let state = self.state.read();
                (
                    state.next_block_producer.clone(),
                    state.latest_header.as_ref().map(|header| header.block_number),
                )
            };
            let Some(producer) = producer else { continue };
            if target.is_some_and(|target| !Arc::ptr_eq(target, &producer)) {
                continue;
            }

            let number = finalized.ok_or(MockerError::TerminalNotReached)? + 1;
            self.state.write().next_fee_recipient = fee_recipient;
            if let Some(tx) = tx {
                producer.send_raw_transaction(tx).await.map_err(|e| {
                    MockerError::SendTransaction {
                        client: producer.name().to_string(),
                        source: e.into(),
                    }
                })?;
            }
            info!(%fee_recipient, client = producer.name(), number, "Set next fee recipient");
            drop(pass);
            return Ok(number);
        }
    }
}

impl std::fmt::Debug for ClMocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClMocker")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
