// Layered configuration mapping the `lithops.config` section groups the
// source system reads out of its config dict: `lithops`, `serverless`, and
// (when the message-bus monitor is selected) `rabbitmq`. Built on `figment`
// so a default layer, an optional YAML file, and environment overrides
// compose the same way a `RunnerSettings` load would, just sourced from the
// ecosystem's layered-config crate rather than a single file parse.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    crate::constants::INVOKER_PROCESSES * 125
}

fn default_runtime_memory() -> u32 {
    256
}

fn default_runtime_timeout() -> u64 {
    300
}

/// `lithops.*` top-level invoker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LithopsSection {
    /// Maximum number of concurrently in-flight invocations (the token
    /// bucket's capacity).
    pub workers: usize,
    /// Selects the job monitor's message-bus mode over storage polling.
    pub rabbitmq_monitor: bool,
}

impl Default for LithopsSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rabbitmq_monitor: false,
        }
    }
}

/// `serverless.*` backend/runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerlessSection {
    pub runtime: String,
    pub runtime_memory: u32,
    pub runtime_timeout: u64,
    /// Delegates the whole job to a single remote activation that runs its
    /// own embedded dispatcher, instead of invoking each call locally.
    pub remote_invoker: bool,
}

impl Default for ServerlessSection {
    fn default() -> Self {
        Self {
            runtime: String::new(),
            runtime_memory: default_runtime_memory(),
            runtime_timeout: default_runtime_timeout(),
            remote_invoker: false,
        }
    }
}

/// `rabbitmq.*` settings, only consulted when `lithops.rabbitmq_monitor` is
/// set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitmqSection {
    pub amqp_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    pub lithops: LithopsSection,
    pub serverless: ServerlessSection,
    pub rabbitmq: RabbitmqSection,
}

impl InvokerConfig {
    /// Builds configuration from, in increasing precedence: compiled-in
    /// defaults, an optional YAML file at `path`, and `INVOKER_`-prefixed
    /// environment variables (e.g. `INVOKER_LITHOPS.WORKERS=64`).
    pub fn load(path: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(InvokerConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("INVOKER_").split("__")).extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = InvokerConfig::default();
        assert_eq!(cfg.lithops.workers, INVOKER_PROCESSES_DEFAULT_WORKERS);
        assert!(!cfg.lithops.rabbitmq_monitor);
        assert!(!cfg.serverless.remote_invoker);
    }

    const INVOKER_PROCESSES_DEFAULT_WORKERS: usize = 2 * 125;

    #[test]
    fn load_without_file_uses_defaults() {
        let cfg = InvokerConfig::load(None).expect("defaults must extract");
        assert_eq!(cfg.serverless.runtime_timeout, 300);
    }
}
