//! The sandbox collaborator (§4.7): `run(artifact_path, entrypoint, payload)
//! -> bytes`. This is explicitly a simplified stand-in for a hardened,
//! process-isolated executor — the trait boundary is where such a runtime
//! would be swapped in without touching the Worker Runtime.

use std::process::Stdio;

use async_trait::async_trait;
use faas_common::model::{FunctionDescriptor, Language};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox trap: {0}")]
    Trap(String),
    #[error("artifact not runnable: {0}")]
    NotRunnable(String),
    #[error("internal sandbox error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SandboxError {
    pub fn trap(msg: impl Into<String>) -> Self {
        SandboxError::Trap(msg.into())
    }
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(
        &self,
        descriptor: &FunctionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<u8>, SandboxError>;
}

/// The in-tree reference sandbox: dispatches on `descriptor.language` and
/// executes the stored artifact as a subprocess (for script-interpreted and
/// native-sandboxed functions) or returns it verbatim (for static assets).
#[derive(Default)]
pub struct SubprocessSandbox;

#[async_trait]
impl Sandbox for SubprocessSandbox {
    async fn run(
        &self,
        descriptor: &FunctionDescriptor,
        payload: &[u8],
    ) -> Result<Vec<u8>, SandboxError> {
        match descriptor.language {
            Language::StaticAsset => tokio::fs::read(&descriptor.artifact_path)
                .await
                .map_err(|e| SandboxError::NotRunnable(e.to_string())),
            Language::ScriptInterpreted => {
                let interpreter = guess_interpreter_from_path(&descriptor.artifact_path)
                    .ok_or_else(|| {
                        SandboxError::NotRunnable(format!(
                            "no interpreter known for artifact {:?}",
                            descriptor.artifact_path
                        ))
                    })?;
                run_subprocess(interpreter, &[descriptor.artifact_path.clone()], payload).await
            }
            Language::NativeSandboxed => {
                run_subprocess(&descriptor.artifact_path, &[], payload).await
            }
        }
    }
}

fn guess_interpreter_from_path(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    Language::interpreter_for(ext)
}

async fn run_subprocess(
    program: &str,
    args: &[String],
    payload: &[u8],
) -> Result<Vec<u8>, SandboxError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SandboxError::trap(format!("failed to start artifact: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        if !payload.is_empty() {
            let _ = stdin.write_all(payload).await;
        }
        // Drop closes the pipe, signaling EOF to the child.
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| SandboxError::trap(format!("artifact I/O failure: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SandboxError::trap(format!(
            "artifact exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}
