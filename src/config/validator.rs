//! Configuration validation.
//!
//! Checks value ranges and the backend URL before any network call is made.

use crate::error::{ConfigError, FitplanError, Result};
use tracing::debug;

use super::settings::SyncConfig;

/// Upper bound for the request timeout.
const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for retry attempts.
const MAX_RETRIES: u32 = 10;

/// Validator for sync configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Warnings produced by a successful validation.
#[derive(Debug, Default)]
pub struct ConfigWarnings {
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a sync configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self, config: &SyncConfig) -> Result<ConfigWarnings> {
        let mut warnings = ConfigWarnings::default();
        let backend = &config.backend;

        if backend.url.trim().is_empty() {
            return Err(invalid("backend.url cannot be empty", "backend.url"));
        }
        if !backend.url.starts_with("http://") && !backend.url.starts_with("https://") {
            return Err(invalid(
                format!("backend.url '{}' must start with http:// or https://", backend.url),
                "backend.url",
            ));
        }
        if backend.url.starts_with("http://")
            && !backend.url.contains("localhost")
            && !backend.url.contains("127.0.0.1")
        {
            warnings
                .warnings
                .push(String::from("backend.url uses plain http for a non-local host"));
        }

        if backend.timeout_secs == 0 || backend.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(invalid(
                format!("backend.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"),
                "backend.timeout_secs",
            ));
        }

        if backend.max_retries == 0 || backend.max_retries > MAX_RETRIES {
            return Err(invalid(
                format!("backend.max_retries must be between 1 and {MAX_RETRIES}"),
                "backend.max_retries",
            ));
        }

        if config.sync.history_limit == 0 {
            warnings
                .warnings
                .push(String::from("sync.history_limit is 0; push history will not be kept"));
        }

        if let Some(guardrails) = &config.guardrails
            && guardrails.max_deletes == Some(0)
        {
            warnings
                .warnings
                .push(String::from("guardrails.max_deletes is 0; every deletion will be blocked"));
        }

        debug!("Configuration validation passed");
        Ok(warnings)
    }
}

fn invalid(message: impl Into<String>, field: &str) -> FitplanError {
    FitplanError::Config(ConfigError::validation(message, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailsConfig;

    #[test]
    fn test_valid_config() {
        let config = SyncConfig::for_backend("https://demo.example.co");
        let warnings = ConfigValidator::new().validate(&config).expect("valid");
        assert!(warnings.warnings.is_empty());
    }

    #[test]
    fn test_invalid_url() {
        let config = SyncConfig::for_backend("demo.example.co");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = SyncConfig::for_backend("http://localhost:54321");
        config.backend.max_retries = 0;
        let err = ConfigValidator::new().validate(&config).expect_err("invalid");
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_warnings() {
        let mut config = SyncConfig::for_backend("http://plans.internal");
        config.guardrails = Some(GuardrailsConfig {
            max_deletes: Some(0),
            block_week_deletes: false,
        });
        let warnings = ConfigValidator::new().validate(&config).expect("valid");
        assert_eq!(warnings.warnings.len(), 2);
    }
}
