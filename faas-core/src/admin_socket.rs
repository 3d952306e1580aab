//! The Dispatcher's admin/invoke socket (§6): `/tmp/faas_lb.sock` by
//! convention. Lets an external tool (or `faas-loadgen --target lb`) send
//! `invoke` frames directly to the Dispatcher, bypassing the Front Socket,
//! and observe `register_worker` frames as they happen.
//!
//! The in-process control path between Dispatcher and Supervisor never uses
//! this socket (REDESIGN FLAGS) — it exists purely as an external interface.

use std::path::Path;
use std::sync::Arc;

use faas_channel::{read_frame, write_frame};
use faas_common::protocol::FrontFrame;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;

pub async fn serve(
    socket_path: impl AsRef<Path>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let socket_path = socket_path.as_ref();
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(path = %socket_path.display(), "admin socket listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let dispatcher = dispatcher.clone();
                let conn_shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher, conn_shutdown).await {
                        tracing::debug!(error = %e, "admin connection ended");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                tracing::info!("admin socket shutting down");
                let _ = std::fs::remove_file(socket_path);
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let mut registrations = dispatcher.supervisor().subscribe_registrations();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        tokio::select! {
            frame = read_frame(&mut reader) => {
                match frame {
                    Ok(Some(value)) => {
                        if let Some(FrontFrame::Invoke(invoke)) = FrontFrame::classify(&value) {
                            let reply = dispatcher.invoke(invoke).await;
                            let reply_value = serde_json::to_value(&reply)
                                .expect("ReplyFrame always serializes");
                            write_frame(&mut write_half, &reply_value).await?;
                        }
                        // Other admin frame types (e.g. a bare `register_worker`
                        // sent by a test harness) are accepted but not acted on;
                        // this socket's registration path is the broadcast below.
                    }
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        tracing::debug!(error = %e, "malformed admin frame");
                        return Ok(());
                    }
                }
            }
            registered = registrations.recv() => {
                match registered {
                    Ok(frame) => {
                        let value = serde_json::json!({
                            "type": "register_worker",
                            "worker_id": frame.worker_id,
                            "pid": frame.pid,
                            "generation": frame.generation,
                        });
                        write_frame(&mut write_half, &value).await?;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {}
                }
            }
            _ = shutdown.cancelled() => return Ok(()),
        }
    }
}
