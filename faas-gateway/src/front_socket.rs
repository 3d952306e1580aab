//! The Front Socket (§4.5): accepts a local connection, reads one frame,
//! classifies it by `type`, and routes `deploy` to the storage collaborator
//! or `invoke` to the Dispatcher. Request-per-connection: after one reply
//! frame is written, the socket is closed.

use std::path::Path;
use std::sync::Arc;

use faas_channel::{read_frame, write_frame, write_typed};
use faas_common::protocol::{DeployReply, FrontFrame};
use faas_core::Dispatcher;
use faas_store::FunctionStore;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

pub async fn serve(
    socket_path: impl AsRef<Path>,
    store: Arc<dyn FunctionStore>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let socket_path = socket_path.as_ref();
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(path = %socket_path.display(), "front socket listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let store = store.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, store, dispatcher).await {
                        tracing::debug!(error = %e, "front connection ended");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                tracing::info!("front socket shutting down");
                let _ = std::fs::remove_file(socket_path);
                return Ok(());
            }
        }
    }
}

#[tracing::instrument(skip(stream, store, dispatcher))]
async fn handle_connection(
    stream: UnixStream,
    store: Arc<dyn FunctionStore>,
    dispatcher: Arc<Dispatcher>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let frame = match read_frame(&mut reader).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "malformed frame on front socket, closing connection");
            return Ok(());
        }
    };

    match FrontFrame::classify(&frame) {
        Some(FrontFrame::Deploy(deploy)) => {
            let reply = match store.store(&deploy.name, &deploy.lang, deploy.code.as_bytes()).await {
                Ok(descriptor) => DeployReply::ok(descriptor.id, descriptor.name, deploy.lang),
                Err(e) => DeployReply::err(e.to_string()),
            };
            write_typed(&mut write_half, &reply).await?;
        }
        Some(FrontFrame::Invoke(invoke)) => {
            let reply = dispatcher.invoke(invoke).await;
            write_typed(&mut write_half, &reply).await?;
        }
        Some(FrontFrame::Admin(_)) | None => {
            let reply = serde_json::json!({"ok": false, "error": "unrecognized frame type"});
            write_frame(&mut write_half, &reply).await?;
        }
    }

    Ok(())
}
