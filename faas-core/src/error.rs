//! Dispatch-fabric error taxonomy (§7). These are distinct from
//! `faas_store::StoreError` and `faas_sandbox::SandboxError`, which belong to
//! the worker's side of the boundary.

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no worker available")]
    NoWorker,
    #[error("worker unavailable")]
    WorkerUnavailable,
    #[error("worker failed: {0}")]
    WorkerFailed(String),
    #[error("internal dispatch error: {0}")]
    Internal(#[from] anyhow::Error),
}
