//! Per-slot state machine (§3): Empty -> Starting -> Idle <-> Busy ->
//! Draining -> Dead -> Starting (respawn).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock as StdRwLock;

use tokio::io::BufReader;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Starting,
    Idle,
    Busy,
    Draining,
    Dead,
}

impl SlotState {
    /// The Dispatcher's selectable set (§4.4): Idle ∪ Busy. A selection may
    /// optimistically land on a Busy slot; `Supervisor::submit` will reject
    /// it with `WorkerUnavailable` and the Dispatcher retries elsewhere.
    pub fn is_selectable(&self) -> bool {
        matches!(self, SlotState::Idle | SlotState::Busy)
    }
}

pub(crate) struct WorkerPipes {
    pub to_worker: ChildStdin,
    pub from_worker: BufReader<ChildStdout>,
}

struct SlotMeta {
    state: SlotState,
    pid: u32,
}

/// One entry in the Supervisor's worker table (I1, I4). `meta` is a cheap,
/// synchronous lock read by selection and by `submit`'s entry check;
/// `pipes` is the per-slot async `Mutex` that `submit` holds across
/// write-then-read to enforce "at most one job in flight" (I2).
pub struct SlotHandle {
    pub index: usize,
    meta: StdRwLock<SlotMeta>,
    generation: AtomicU64,
    pub(crate) pipes: Mutex<Option<WorkerPipes>>,
}

impl SlotHandle {
    pub fn empty(index: usize) -> SlotHandle {
        SlotHandle {
            index,
            meta: StdRwLock::new(SlotMeta {
                state: SlotState::Empty,
                pid: 0,
            }),
            generation: AtomicU64::new(0),
            pipes: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SlotState {
        self.meta.read().unwrap().state
    }

    pub fn pid(&self) -> u32 {
        self.meta.read().unwrap().pid
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: SlotState) {
        self.meta.write().unwrap().state = state;
    }

    pub(crate) fn mark_starting(&self, pid: u32) {
        let mut meta = self.meta.write().unwrap();
        meta.state = SlotState::Starting;
        meta.pid = pid;
    }

    pub(crate) fn mark_idle(&self) {
        self.set_state(SlotState::Idle);
    }

    pub(crate) fn mark_dead(&self) {
        let mut meta = self.meta.write().unwrap();
        meta.state = SlotState::Dead;
        meta.pid = 0;
    }

    /// Bumps the generation counter. Called exactly once per respawn, right
    /// before the new worker's pipes are installed, so a reply belonging to
    /// the worker that just died can never be mistaken for belonging to its
    /// replacement (I3).
    pub(crate) fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}
