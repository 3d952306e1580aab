//! The gateway binary: Supervisor + Dispatcher + Front Socket in one
//! process (REDESIGN FLAGS — collapsed, no cross-process round-trip for
//! `forward_to_worker`).

mod config;
mod front_socket;

use std::sync::Arc;

use config::GatewayConfig;
use faas_common::config::ConfigLoader;
use faas_common::tracing_init;
use faas_common::SafeDisplay;
use faas_core::{Dispatcher, Supervisor};
use faas_store::FsFunctionStore;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dump_requested = std::env::args().any(|a| a == "--dump-config");
    let loader: ConfigLoader<GatewayConfig> =
        ConfigLoader::new("config/gateway.toml", "FAAS_GATEWAY_");
    let config = match loader.load_or_dump_config() {
        Some(config) => config,
        None => {
            if dump_requested {
                return Ok(());
            }
            std::process::exit(1);
        }
    };

    tracing_init::init_tracing_with_default_env_filter(&config.tracing);
    tracing::info!(config = %config.to_safe_string(), "gateway starting");

    let store: Arc<dyn faas_store::FunctionStore> =
        Arc::new(FsFunctionStore::new(config.dispatch.function_store_root.clone()));

    let supervisor = Supervisor::new(config.dispatch.clone());
    supervisor.start().await;
    let dispatcher = Arc::new(Dispatcher::new(supervisor.clone()));

    let shutdown = CancellationToken::new();

    let admin_task = tokio::spawn(faas_core::admin_socket::serve(
        config.admin_socket_path.clone(),
        dispatcher.clone(),
        shutdown.clone(),
    ));
    let front_task = tokio::spawn(front_socket::serve(
        config.front_socket_path.clone(),
        store,
        dispatcher,
        shutdown.clone(),
    ));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections");
    shutdown.cancel();

    let grace = config.dispatch.shutdown_grace;
    let _ = tokio::time::timeout(grace, async {
        let _ = admin_task.await;
        let _ = front_task.await;
    })
    .await;

    supervisor.shutdown().await;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
