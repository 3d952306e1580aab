use std::path::PathBuf;

use faas_common::tracing_init::TracingConfig;
use faas_common::SafeDisplay;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadgenConfig {
    pub front_socket_path: PathBuf,
    pub admin_socket_path: PathBuf,
    pub tracing: TracingConfig,
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        LoadgenConfig {
            front_socket_path: PathBuf::from("/tmp/faas_server.sock"),
            admin_socket_path: PathBuf::from("/tmp/faas_lb.sock"),
            tracing: TracingConfig::local_dev("faas_loadgen"),
        }
    }
}

impl SafeDisplay for LoadgenConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "front_socket_path: {}\nadmin_socket_path: {}",
            self.front_socket_path.display(),
            self.admin_socket_path.display(),
        )
    }
}
