use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// How long a predicate wait may stay pending before answering 504
    pub wait_timeout_secs: u64,
    pub topology: TopologyConfig,
}

/// Broker objects declared at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub exchanges: Vec<String>,
    pub queues: Vec<String>,
    pub bindings: Vec<BindingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindingConfig {
    pub queue: String,
    pub exchange: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            topology: TopologyConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `LISTEN` and `WAIT_TIMEOUT_SECS`.
    pub fn load() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Reads the YAML file named by `CONFIG` if set, otherwise [`Config::load`].
    pub fn resolve() -> anyhow::Result<Self> {
        match std::env::var("CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::load()),
        }
    }

    /// Reads a YAML file. Environment variables still take precedence.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg = Self::from_yaml(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg.with_env(|key| std::env::var(key).ok()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("LISTEN") {
            self.listen_addr = addr;
        }
        if let Some(raw) = lookup("WAIT_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => self.wait_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid WAIT_TIMEOUT_SECS"),
            }
        }
        self
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
