//! Gateway (Supervisor+Dispatcher+Front Socket) process configuration.

use std::path::PathBuf;

use faas_common::tracing_init::TracingConfig;
use faas_common::SafeDisplay;
use faas_core::CoreConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Front Socket path (§6): `/tmp/faas_server.sock` by default.
    pub front_socket_path: PathBuf,
    /// Dispatcher's admin/invoke socket path (§6): `/tmp/faas_lb.sock`.
    pub admin_socket_path: PathBuf,
    pub dispatch: CoreConfig,
    pub tracing: TracingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            front_socket_path: PathBuf::from("/tmp/faas_server.sock"),
            admin_socket_path: PathBuf::from("/tmp/faas_lb.sock"),
            dispatch: CoreConfig::default(),
            tracing: TracingConfig::local_dev("faas_gateway"),
        }
    }
}

impl SafeDisplay for GatewayConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "front_socket_path: {}\nadmin_socket_path: {}\ndispatch:\n{}\ntracing:\n{}",
            self.front_socket_path.display(),
            self.admin_socket_path.display(),
            self.dispatch.to_safe_string_indented(),
            self.tracing.to_safe_string_indented(),
        )
    }
}
