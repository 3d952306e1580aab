//! Chooses a worker per invocation under a configurable policy and calls
//! the Supervisor (§4.4). Dispatcher and Supervisor are collapsed into one
//! process (REDESIGN FLAGS): `invoke` calls `Supervisor::submit` directly,
//! no second socket hop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use faas_common::protocol::{InvokeFrame, JobFrame, ReplyFrame};

use crate::error::DispatchError;
use crate::policy;
use crate::supervisor::Supervisor;

pub struct Dispatcher {
    supervisor: Arc<Supervisor>,
    rr_cursor: AtomicUsize,
    /// True in-flight gauge per slot (REDESIGN FLAGS): incremented when a
    /// job is handed to a slot, decremented when its reply is observed.
    load: Vec<AtomicI64>,
}

impl Dispatcher {
    pub fn new(supervisor: Arc<Supervisor>) -> Dispatcher {
        let pool_size = supervisor.pool_size();
        Dispatcher {
            supervisor,
            rr_cursor: AtomicUsize::new(0),
            load: (0..pool_size).map(|_| AtomicI64::new(0)).collect(),
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    #[tracing::instrument(skip(self, frame), fields(fn_ = %frame.fn_))]
    pub async fn invoke(&self, frame: InvokeFrame) -> ReplyFrame {
        let job = JobFrame::from_invoke(frame);
        let config = self.supervisor.config();
        let mut excluded = HashSet::new();

        for _attempt in 0..=config.retry_count {
            let selectable = self.supervisor.selectable_snapshot();
            let idx = match policy::select(
                config.policy,
                &selectable,
                &excluded,
                &self.rr_cursor,
                &self.load,
            ) {
                Some(idx) => idx,
                None => return ReplyFrame::err(DispatchError::NoWorker.to_string()),
            };
            excluded.insert(idx);

            self.load[idx].fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + config.submit_deadline;
            let result = self.supervisor.submit(idx, job.clone(), deadline).await;
            self.load[idx].fetch_sub(1, Ordering::SeqCst);

            match result {
                Ok(reply) => return reply,
                Err(DispatchError::WorkerUnavailable) | Err(DispatchError::WorkerFailed(_)) => {
                    continue;
                }
                Err(e) => return ReplyFrame::err(e.to_string()),
            }
        }

        ReplyFrame::err(DispatchError::NoWorker.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    #[tokio::test]
    async fn invoke_against_an_empty_pool_is_no_worker_available() {
        let config = CoreConfig {
            pool_size: 0,
            ..CoreConfig::default()
        };
        let supervisor = Supervisor::new(config);
        let dispatcher = Dispatcher::new(supervisor);

        let reply = dispatcher
            .invoke(InvokeFrame {
                fn_: "anything".into(),
                payload: String::new(),
            })
            .await;

        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("no worker available"));
    }
}
