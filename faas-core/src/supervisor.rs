//! Owns the worker pool (§4.3): spawns worker processes, tracks each slot's
//! state machine, and serializes job delivery to each worker so at most one
//! job is ever in flight per slot (I2). Shares its slot table in-process
//! with the Dispatcher — per REDESIGN FLAGS there is no second socket
//! round-trip between the two.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use faas_channel::ChannelError;
use faas_common::protocol::{JobFrame, RegisterWorkerFrame, ReplyFrame};
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};

use crate::config::CoreConfig;
use crate::error::DispatchError;
use crate::slot::{SlotHandle, SlotState, WorkerPipes};

struct SlotDied {
    index: usize,
    generation: u64,
}

pub struct Supervisor {
    config: CoreConfig,
    slots: Vec<Arc<SlotHandle>>,
    register_tx: broadcast::Sender<RegisterWorkerFrame>,
    death_tx: mpsc::UnboundedSender<SlotDied>,
}

impl Supervisor {
    pub fn new(config: CoreConfig) -> Arc<Supervisor> {
        let pool_size = config.clamped_pool_size();
        let slots = (0..pool_size)
            .map(SlotHandle::empty)
            .map(Arc::new)
            .collect();
        let (register_tx, _) = broadcast::channel(256);
        let (death_tx, death_rx) = mpsc::unbounded_channel();

        let supervisor = Arc::new(Supervisor {
            config,
            slots,
            register_tx,
            death_tx,
        });
        spawn_respawn_coordinator(supervisor.clone(), death_rx);
        supervisor
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    pub fn subscribe_registrations(&self) -> broadcast::Receiver<RegisterWorkerFrame> {
        self.register_tx.subscribe()
    }

    /// A snapshot of which slots are currently selectable (Idle ∪ Busy),
    /// read through each slot's cheap meta lock. No pipe I/O is touched.
    pub fn selectable_snapshot(&self) -> Vec<bool> {
        self.slots.iter().map(|s| s.state().is_selectable()).collect()
    }

    pub fn slot_states(&self) -> Vec<(usize, String, u32, u64)> {
        self.slots
            .iter()
            .map(|s| (s.index, format!("{:?}", s.state()), s.pid(), s.generation()))
            .collect()
    }

    /// Pre-warms the pool: spawns all `P` workers sequentially with a short
    /// inter-spawn delay to smooth resource usage at startup.
    pub async fn start(self: &Arc<Self>) {
        for index in 0..self.slots.len() {
            self.spawn_slot(index).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn spawn_slot(self: &Arc<Self>, index: usize) {
        let slot = self.slots[index].clone();

        let spawned = Command::new(&self.config.worker_binary_path)
            .env("WORKER_ID", index.to_string())
            .env("FAAS_FUNCTION_STORE_ROOT", &self.config.function_store_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(index, error = %e, "failed to spawn worker, slot stays Dead");
                slot.mark_dead();
                return;
            }
        };

        let pid = child.id().unwrap_or(0);
        slot.mark_starting(pid);

        let stdin = child.stdin.take().expect("spawned with piped stdin");
        let stdout = child.stdout.take().expect("spawned with piped stdout");
        *slot.pipes.lock().await = Some(WorkerPipes {
            to_worker: stdin,
            from_worker: BufReader::new(stdout),
        });
        slot.mark_idle();

        let generation = slot.generation();
        let _ = self.register_tx.send(RegisterWorkerFrame {
            worker_id: index,
            pid,
            generation,
        });
        tracing::info!(index, pid, generation, "worker registered");

        let death_tx = self.death_tx.clone();
        tokio::spawn(async move {
            let _ = child.wait().await;
            let _ = death_tx.send(SlotDied { index, generation });
        });
    }

    /// Delivers one job to `index` and waits for its reply under `deadline`.
    /// On any failure the slot is torn down (signaled, pipes closed, marked
    /// Dead) and the caller gets `WorkerFailed`; the reaper respawns it.
    #[tracing::instrument(skip(self, job), fields(index, fn_ = %job.fn_))]
    pub async fn submit(
        &self,
        index: usize,
        job: JobFrame,
        deadline: Instant,
    ) -> Result<ReplyFrame, DispatchError> {
        let slot = self.slots.get(index).ok_or(DispatchError::WorkerUnavailable)?;
        let mut guard = slot.pipes.lock().await;

        if slot.state() != SlotState::Idle || guard.is_none() {
            return Err(DispatchError::WorkerUnavailable);
        }
        slot.set_state(SlotState::Busy);

        let outcome = run_job(guard.as_mut().expect("checked Some above"), &job, deadline).await;

        match outcome {
            Ok(reply) => {
                slot.mark_idle();
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "submit failed, tearing down slot");
                slot.set_state(SlotState::Draining);
                let pid = slot.pid();
                if pid != 0 {
                    let _ = nix::sys::signal::kill(
                        nix::unistd::Pid::from_raw(pid as i32),
                        nix::sys::signal::Signal::SIGTERM,
                    );
                }
                *guard = None;
                slot.mark_dead();
                Err(DispatchError::WorkerFailed(e.to_string()))
            }
        }
    }

    /// Graceful shutdown (§5): SIGTERM every worker with a live pid, close
    /// every slot's pipe ends, then wait `shutdown_grace` before returning so
    /// workers have a chance to exit on their own rather than being reaped by
    /// the process tearing down around them.
    pub async fn shutdown(&self) {
        for slot in &self.slots {
            let pid = slot.pid();
            if pid != 0 {
                let _ = nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGTERM,
                );
            }
        }
        for slot in &self.slots {
            *slot.pipes.lock().await = None;
            slot.mark_dead();
        }
        tokio::time::sleep(self.config.shutdown_grace).await;
    }
}

async fn run_job(
    pipes: &mut WorkerPipes,
    job: &JobFrame,
    deadline: Instant,
) -> Result<ReplyFrame, ChannelError> {
    faas_channel::write_frame(&mut pipes.to_worker, &job.to_wire()).await?;

    let remaining = deadline.saturating_duration_since(Instant::now());
    let read = tokio::time::timeout(
        remaining,
        faas_channel::read_typed::<_, ReplyFrame>(&mut pipes.from_worker),
    )
    .await
    .map_err(|_| {
        ChannelError::ChannelClosed(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "submit deadline exceeded",
        ))
    })??;

    read.ok_or_else(|| {
        ChannelError::ChannelClosed(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "worker closed its output stream",
        ))
    })
}

/// A single task that serially consumes `SlotDied` notifications so
/// concurrent exits never race on the same slot. Respawn is idempotent
/// against spurious or stale notifications: a death reported for a
/// generation the slot has already moved past is ignored.
fn spawn_respawn_coordinator(
    supervisor: Arc<Supervisor>,
    mut death_rx: mpsc::UnboundedReceiver<SlotDied>,
) {
    tokio::spawn(async move {
        while let Some(died) = death_rx.recv().await {
            let slot = supervisor.slots[died.index].clone();
            if slot.generation() != died.generation {
                tracing::debug!(index = died.index, "stale exit notification, ignoring");
                continue;
            }

            if slot.state() != SlotState::Dead {
                slot.mark_dead();
            }
            *slot.pipes.lock().await = None;
            slot.bump_generation();

            tracing::warn!(index = died.index, "worker exited, respawning");
            supervisor.spawn_slot(died.index).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionPolicy;
    use std::path::PathBuf;

    fn test_config(pool_size: usize) -> CoreConfig {
        // Never actually spawned by these tests, which only exercise paths
        // that fail before a process would be started.
        CoreConfig {
            pool_size,
            policy: SelectionPolicy::RoundRobin,
            submit_deadline: Duration::from_millis(500),
            retry_count: 1,
            shutdown_grace: Duration::from_millis(200),
            worker_binary_path: PathBuf::from("/nonexistent/faas-worker"),
            function_store_root: PathBuf::from("./unused"),
        }
    }

    #[tokio::test]
    async fn pool_size_zero_has_no_selectable_slots() {
        let config = CoreConfig {
            pool_size: 0,
            ..CoreConfig::default()
        };
        let supervisor = Supervisor::new(config);
        assert!(supervisor.selectable_snapshot().is_empty());
    }

    #[tokio::test]
    async fn submit_against_an_unspawned_slot_is_worker_unavailable() {
        let config = CoreConfig {
            pool_size: 1,
            ..CoreConfig::default()
        };
        let supervisor = Supervisor::new(config);
        let job = JobFrame {
            fn_: "x".into(),
            payload: String::new(),
        };
        let err = supervisor
            .submit(0, job, Instant::now() + Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::WorkerUnavailable));
    }

    #[tokio::test]
    async fn submit_against_an_out_of_range_index_is_worker_unavailable() {
        let supervisor = Supervisor::new(test_config(1));
        let job = JobFrame {
            fn_: "x".into(),
            payload: String::new(),
        };
        let err = supervisor
            .submit(5, job, Instant::now() + Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::WorkerUnavailable));
    }

    #[tokio::test]
    async fn shutdown_marks_every_slot_dead_and_waits_out_the_grace_period() {
        let supervisor = Supervisor::new(test_config(2));
        let grace = supervisor.config().shutdown_grace;

        let start = Instant::now();
        supervisor.shutdown().await;

        assert!(start.elapsed() >= grace);
        for state in supervisor.slot_states() {
            assert_eq!(state.1, "Dead");
        }
    }
}
