//! Configuration types for `fitplan.yaml`.
//!
//! These types define the structure of the configuration file and are
//! deserialized with serde.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default state directory, relative to the configuration file.
pub const DEFAULT_STATE_DIR: &str = ".fitplan";

/// Starter configuration written by `fitplan init`.
pub const CONFIG_TEMPLATE: &str = r"# fitplan configuration
backend:
  # Base URL of the plan backend (remote procedures live under /rest/v1/rpc)
  url: https://your-project.example.co
  timeout_secs: 30
  max_retries: 3

state:
  path: .fitplan

sync:
  continue_on_error: false
  refetch_after_push: true
  history_limit: 50

guardrails:
  max_deletes: 25
  block_week_deletes: false
";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Edit session storage.
    #[serde(default)]
    pub state: StateConfig,
    /// Push behavior.
    #[serde(default)]
    pub sync: SyncOptions,
    /// Optional guardrails applied to sync plans.
    #[serde(default)]
    pub guardrails: Option<GuardrailsConfig>,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the backend.
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum attempts per remote procedure call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Edit session storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Directory holding the session and lock files.
    #[serde(default)]
    pub path: Option<String>,
}

/// Push behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncOptions {
    /// Keep executing independent actions after a failure.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Refetch the plan after a push instead of trusting the remapped working tree.
    #[serde(default = "default_refetch")]
    pub refetch_after_push: bool,
    /// Number of push records kept in the session.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Guardrails against destructive pushes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardrailsConfig {
    /// Maximum number of delete actions in one push.
    #[serde(default)]
    pub max_deletes: Option<usize>,
    /// Refuse to delete whole weeks.
    #[serde(default)]
    pub block_week_deletes: bool,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_refetch() -> bool {
    true
}

const fn default_history_limit() -> usize {
    50
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            refetch_after_push: default_refetch(),
            history_limit: default_history_limit(),
        }
    }
}

impl StateConfig {
    /// Returns the state directory, defaulting to `.fitplan`.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(self.path.as_deref().unwrap_or(DEFAULT_STATE_DIR))
    }
}

impl SyncConfig {
    /// Creates a configuration for the given backend with defaults elsewhere.
    #[must_use]
    pub fn for_backend(url: &str) -> Self {
        Self {
            backend: BackendConfig {
                url: url.to_string(),
                timeout_secs: default_timeout_secs(),
                max_retries: default_max_retries(),
            },
            state: StateConfig::default(),
            sync: SyncOptions::default(),
            guardrails: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config: SyncConfig = serde_yaml::from_str(CONFIG_TEMPLATE).expect("template");
        assert_eq!(config.backend.max_retries, 3);
        assert_eq!(config.state.dir(), PathBuf::from(".fitplan"));
        assert_eq!(
            config.guardrails.and_then(|g| g.max_deletes),
            Some(25)
        );
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::for_backend("http://localhost:54321");
        assert_eq!(config.backend.timeout_secs, 30);
        assert!(config.sync.refetch_after_push);
        assert!(!config.sync.continue_on_error);
        assert_eq!(config.state.dir(), PathBuf::from(DEFAULT_STATE_DIR));
    }
}
