//! Rendezvous points inside a production cycle.
//!
//! Each [`Gate`] is a fair async mutex that the mocker holds while it works. When the cycle
//! reaches a checkpoint the mocker lets go of the gate and immediately queues for it again, so
//! every [`Gate::wait`] issued before that moment gets a [`CheckpointPass`] first, in FIFO
//! order. The mocker cannot leave the checkpoint while a pass is alive, which lets test logic
//! inspect or change state at an exact point of the cycle.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The six checkpoints of a production cycle, in the order the mocker reaches them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// A proposer has been selected; the build request has not been sent yet.
    PayloadBuild,
    /// The proposer returned the payload.
    GetPayload,
    /// Every client has been asked to execute the payload.
    ExecutePayload,
    /// Head moved to the new block.
    HeadForkchoice,
    /// Safe moved to the new block.
    SafeForkchoice,
    /// Finalized moved to the new block and bookkeeping is done.
    FinalizedForkchoice,
}

impl Checkpoint {
    /// Every checkpoint in the order a cycle passes them.
    pub const ALL: [Checkpoint; 6] = [
        Checkpoint::PayloadBuild,
        Checkpoint::GetPayload,
        Checkpoint::ExecutePayload,
        Checkpoint::HeadForkchoice,
        Checkpoint::SafeForkchoice,
        Checkpoint::FinalizedForkchoice,
    ];

    /// Position of the checkpoint within a cycle.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Checkpoint::PayloadBuild => "payload-build",
            Checkpoint::GetPayload => "get-payload",
            Checkpoint::ExecutePayload => "execute-payload",
            Checkpoint::HeadForkchoice => "head-forkchoice",
            Checkpoint::SafeForkchoice => "safe-forkchoice",
            Checkpoint::FinalizedForkchoice => "finalized-forkchoice",
        };
        f.write_str(name)
    }
}

/// Holding a pass keeps the mocker parked at its checkpoint. Drop it to let the cycle go on.
#[must_use = "the mocker resumes as soon as the pass is dropped"]
pub struct CheckpointPass {
    checkpoint: Checkpoint,
    _guard: OwnedMutexGuard<()>,
}

impl CheckpointPass {
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }
}

impl fmt::Debug for CheckpointPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointPass").field("checkpoint", &self.checkpoint).finish()
    }
}

/// External side of one checkpoint.
#[derive(Clone)]
pub struct Gate {
    checkpoint: Checkpoint,
    lock: Arc<Mutex<()>>,
    halted: Arc<AtomicBool>,
}

impl Gate {
    /// Waits until the mocker reaches this checkpoint.
    ///
    /// Returns `None` once block production has halted; gates stay open from then on.
    ///
    /// The cycle keeps the client registry locked up to [`Checkpoint::FinalizedForkchoice`], so
    /// a task holding an earlier pass must not await a registration or removal before dropping
    /// it. Registry reads do not take that lock.
    pub async fn wait(&self) -> Option<CheckpointPass> {
        if self.is_halted() {
            return None;
        }
        let guard = self.lock.clone().lock_owned().await;
        if self.is_halted() {
            return None;
        }
        Some(CheckpointPass { checkpoint: self.checkpoint, _guard: guard })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("checkpoint", &self.checkpoint)
            .field("halted", &self.is_halted())
            .finish()
    }
}

/// All six gates, indexed by [`Checkpoint`].
#[derive(Clone, Debug)]
pub struct Checkpoints {
    gates: [Gate; 6],
}

impl Checkpoints {
    /// Creates the gates already held by the returned [`GateKeeper`].
    pub(crate) fn closed() -> (Self, GateKeeper) {
        let halted = Arc::new(AtomicBool::new(false));
        let locks = Checkpoint::ALL.map(|_| Arc::new(Mutex::new(())));
        // Freshly created locks are always free.
        let held = locks.clone().map(|lock| lock.try_lock_owned().ok());
        let gates = Checkpoint::ALL.map(|checkpoint| Gate {
            checkpoint,
            lock: locks[checkpoint.index()].clone(),
            halted: halted.clone(),
        });
        (Self { gates }, GateKeeper { locks, held, halted })
    }

    pub fn get(&self, checkpoint: Checkpoint) -> &Gate {
        &self.gates[checkpoint.index()]
    }

    pub fn is_halted(&self) -> bool {
        self.gates[0].is_halted()
    }
}

/// Driver side of the checkpoints: owns the guards that keep every gate closed.
pub(crate) struct GateKeeper {
    locks: [Arc<Mutex<()>>; 6],
    held: [Option<OwnedMutexGuard<()>>; 6],
    halted: Arc<AtomicBool>,
}

impl GateKeeper {
    /// Releases `checkpoint` to everyone already queued on it and takes it back.
    ///
    /// If `shutdown` fires while a pass is still held, every gate is drained instead and the
    /// caller continues without checkpoints.
    pub(crate) async fn pass(&mut self, checkpoint: Checkpoint, shutdown: &CancellationToken) {
        if self.is_halted() {
            return;
        }
        let idx = checkpoint.index();
        debug!(%checkpoint, "Reached checkpoint");
        self.held[idx] = None;

        let lock = self.locks[idx].clone();
        tokio::select! {
            biased;
            guard = lock.lock_owned() => self.held[idx] = Some(guard),
            _ = shutdown.cancelled() => self.drain(),
        }
    }

    /// Opens every gate for good. Pending and future waits resolve to `None`.
    pub(crate) fn drain(&mut self) {
        if self.halted.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Draining checkpoints");
        self.held = Default::default();
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl Drop for GateKeeper {
    fn drop(&mut self) {
        self.drain();
    }
}
