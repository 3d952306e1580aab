//! Dispatch-fabric configuration: pool size, selection policy, deadlines.

use std::path::PathBuf;
use std::time::Duration;

use faas_common::SafeDisplay;
use serde::{Deserialize, Serialize};

/// Hard ceiling on pool size regardless of configuration (§4.3).
pub const MAX_WORKERS: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    #[default]
    RoundRobin,
    FirstAvailable,
    Weighted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreConfig {
    /// Number of workers to pre-warm at startup.
    pub pool_size: usize,
    pub policy: SelectionPolicy,
    /// Absolute deadline given to each `Supervisor::submit` call.
    #[serde(with = "humantime_serde")]
    pub submit_deadline: Duration,
    /// Extra selectable workers the Dispatcher will try, beyond the first,
    /// before giving up on an invocation (`R` in §4.4).
    pub retry_count: usize,
    /// Grace period given to workers after SIGTERM during shutdown.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    pub worker_binary_path: PathBuf,
    pub function_store_root: PathBuf,
}

impl CoreConfig {
    pub fn clamped_pool_size(&self) -> usize {
        self.pool_size.min(MAX_WORKERS)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            pool_size: 4,
            policy: SelectionPolicy::RoundRobin,
            submit_deadline: Duration::from_secs(5),
            retry_count: 1,
            shutdown_grace: Duration::from_secs(2),
            worker_binary_path: PathBuf::from("faas-worker"),
            function_store_root: PathBuf::from("./faas-data"),
        }
    }
}

impl SafeDisplay for CoreConfig {
    fn to_safe_string(&self) -> String {
        format!(
            "pool_size: {}\npolicy: {:?}\nsubmit_deadline: {:?}\nretry_count: {}\nshutdown_grace: {:?}\nworker_binary_path: {}\nfunction_store_root: {}",
            self.clamped_pool_size(),
            self.policy,
            self.submit_deadline,
            self.retry_count,
            self.shutdown_grace,
            self.worker_binary_path.display(),
            self.function_store_root.display(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_round_robin() {
        assert_eq!(CoreConfig::default().policy, SelectionPolicy::RoundRobin);
    }

    #[test]
    fn pool_size_is_clamped_to_max_workers() {
        let config = CoreConfig {
            pool_size: 10_000,
            ..CoreConfig::default()
        };
        assert_eq!(config.clamped_pool_size(), MAX_WORKERS);
    }
}
