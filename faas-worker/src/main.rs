//! The Worker Runtime (§4.2): reads job frames from stdin, executes them via
//! the sandbox collaborator, and writes reply frames to stdout. Spawned and
//! owned by the Supervisor, one process per slot.

use std::path::PathBuf;

use faas_common::config::ConfigLoader;
use faas_common::model::FunctionDescriptor;
use faas_common::protocol::{JobFrame, ReplyFrame};
use faas_common::tracing_init::{self, TracingConfig};
use faas_store::{FsFunctionStore, FunctionStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::io::{stdin, stdout, BufReader};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WorkerConfig {
    function_store_root: PathBuf,
    tracing: TracingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            function_store_root: PathBuf::from("./faas-data"),
            tracing: TracingConfig::default(),
        }
    }
}

impl faas_common::SafeDisplay for WorkerConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "function_store_root: {}\n{}",
            self.function_store_root.display(),
            self.tracing.to_safe_string_indented()
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dump_requested = std::env::args().any(|a| a == "--dump-config");
    let loader: ConfigLoader<WorkerConfig> =
        ConfigLoader::new("config/worker.toml", "FAAS_WORKER_");
    let mut config = match loader.load_or_dump_config() {
        Some(config) => config,
        None => {
            if dump_requested {
                return Ok(());
            }
            std::process::exit(1);
        }
    };

    // Per §6, this is a literal (unprefixed) environment variable, not a
    // config-file key, so it overrides independently of the FAAS_WORKER_
    // prefix the rest of the configuration uses.
    if let Ok(root) = std::env::var("FAAS_FUNCTION_STORE_ROOT") {
        config.function_store_root = PathBuf::from(root);
    }

    tracing_init::init_tracing_with_default_env_filter(&config.tracing);
    tracing::info!(config = %config.to_safe_string(), "worker starting");

    let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| "unknown".to_string());
    let store = FsFunctionStore::new(config.function_store_root.clone());
    let sandbox = faas_sandbox::SubprocessSandbox;

    run(worker_id, &store, &sandbox).await
}

async fn run(
    worker_id: String,
    store: &impl FunctionStore,
    sandbox: &impl faas_sandbox::Sandbox,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stdin());
    let mut writer = stdout();

    loop {
        match faas_channel::read_typed::<_, JobFrame>(&mut reader).await {
            Ok(None) => {
                tracing::info!(worker_id, "input stream closed, shutting down cleanly");
                return Ok(());
            }
            Ok(Some(job)) => {
                let reply = handle_job(&worker_id, store, sandbox, job).await;
                faas_channel::write_typed(&mut writer, &reply).await?;
            }
            Err(faas_channel::ChannelError::MalformedFrame(e)) => {
                tracing::warn!(worker_id, error = %e, "malformed job frame, replying with error");
                let reply = ReplyFrame::err(format!("malformed job frame: {e}"));
                faas_channel::write_typed(&mut writer, &reply).await?;
            }
            Err(faas_channel::ChannelError::FrameTooLarge) => {
                tracing::warn!(worker_id, "oversized job frame, replying with error");
                let reply = ReplyFrame::err("frame exceeds the maximum line size");
                faas_channel::write_typed(&mut writer, &reply).await?;
            }
            Err(faas_channel::ChannelError::ChannelClosed(e)) => {
                tracing::error!(worker_id, error = %e, "fatal I/O error reading job frames");
                anyhow::bail!("fatal channel error: {e}");
            }
        }
    }
}

#[tracing::instrument(skip(store, sandbox, job), fields(fn_ = %job.fn_))]
async fn handle_job(
    worker_id: &str,
    store: &impl FunctionStore,
    sandbox: &impl faas_sandbox::Sandbox,
    job: JobFrame,
) -> ReplyFrame {
    let descriptor = match resolve_descriptor(store, &job.fn_).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            tracing::info!(worker_id, fn_ = %job.fn_, "function not found: {e}");
            return ReplyFrame::err(e.to_string());
        }
    };

    match sandbox.run(&descriptor, job.payload.as_bytes()).await {
        Ok(output) => ReplyFrame::ok(String::from_utf8_lossy(&output).into_owned()),
        Err(e) => {
            tracing::warn!(worker_id, fn_ = %job.fn_, "sandbox trap: {e}");
            ReplyFrame::err(e.to_string())
        }
    }
}

/// `fn` in a job frame may be the opaque id minted by the store, or a
/// function name; try the id path first since it's the hot path for a
/// gateway that already resolved the name at deploy time.
async fn resolve_descriptor(
    store: &impl FunctionStore,
    fn_: &str,
) -> Result<FunctionDescriptor, StoreError> {
    match store.load_meta(fn_).await {
        Ok(descriptor) => Ok(descriptor),
        Err(StoreError::FunctionNotFound(_)) => {
            let id = store.find_by_name(fn_).await?;
            store.load_meta(&id).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_sandbox::SubprocessSandbox;

    #[tokio::test]
    async fn resolve_by_id_and_by_name_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());
        let descriptor = store.store("greet", "sh", b"echo hi").await.unwrap();

        let by_id = resolve_descriptor(&store, &descriptor.id).await.unwrap();
        assert_eq!(by_id.id, descriptor.id);

        let by_name = resolve_descriptor(&store, "greet").await.unwrap();
        assert_eq!(by_name.id, descriptor.id);
    }

    #[tokio::test]
    async fn unknown_function_becomes_an_error_reply_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());
        let sandbox = SubprocessSandbox;

        let job = JobFrame {
            fn_: "does-not-exist".to_string(),
            payload: String::new(),
        };
        let reply = handle_job("w0", &store, &sandbox, job).await;
        assert!(!reply.ok);
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn happy_path_invoke_returns_captured_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());
        let sandbox = SubprocessSandbox;

        let descriptor = store.store("hello", "sh", b"echo HELLO").await.unwrap();
        let job = JobFrame {
            fn_: descriptor.id.clone(),
            payload: String::new(),
        };
        let reply = handle_job("w0", &store, &sandbox, job).await;
        assert!(reply.ok);
        assert_eq!(reply.output.unwrap(), "HELLO\n");
    }
}
