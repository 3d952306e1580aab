//! Structured logging setup, shared by every long-running binary.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::SafeDisplay;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Default filter directive applied when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl TracingConfig {
    pub fn local_dev(component: &str) -> TracingConfig {
        TracingConfig {
            default_filter: format!("info,{component}=debug"),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            default_filter: "info".to_string(),
        }
    }
}

impl SafeDisplay for TracingConfig {
    fn to_safe_string(&self) -> String {
        format!("default_filter: {}", self.default_filter)
    }
}

/// Installs a `fmt` subscriber gated by `RUST_LOG`, falling back to
/// `config.default_filter` when the environment variable is unset.
///
/// Worker processes must call this before ever touching stdout for
/// anything other than reply frames: `fmt` writes to stderr by default,
/// which this relies on to keep the Framed Channel on stdout uncorrupted.
pub fn init_tracing_with_default_env_filter(config: &TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
