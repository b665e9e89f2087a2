//! Error types for the fitplan sync system.
//!
//! This module provides the error hierarchy for every stage of an edit
//! session: configuration, snapshot handling, session state, backend
//! remote procedures, sync planning, and synchronization.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the fitplan sync system.
#[derive(Debug, Error)]
pub enum FitplanError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plan snapshot errors.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Edit session state errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Backend remote procedure errors.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Sync planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Synchronization errors.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Plan snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A snapshot file could not be read or parsed.
    #[error("Failed to read snapshot {path}: {message}")]
    Unreadable {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A snapshot could not be serialized.
    #[error("Failed to write snapshot: {message}")]
    Unwritable {
        /// Description of the failure.
        message: String,
    },

    /// The two snapshots describe different plans.
    #[error("Snapshots belong to different plans: original {original}, current {current}")]
    PlanMismatch {
        /// Root id of the original snapshot.
        original: String,
        /// Root id of the current snapshot.
        current: String,
    },

    /// An entity referenced by an edit does not exist.
    #[error("{level} not found: {id}")]
    EntityNotFound {
        /// Hierarchy level of the entity.
        level: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Snapshot validation failed.
    #[error("Snapshot validation failed at {field}: {message}")]
    Invalid {
        /// Location of the offending value.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

/// Edit session state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// No edit session has been checked out.
    #[error("No edit session found at {location}; run `fitplan checkout <plan-id>` first")]
    NoSession {
        /// Where the session was expected.
        location: String,
    },

    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Backend remote procedure errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Authentication failed.
    #[error("Backend authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// A remote procedure returned an error.
    #[error("Remote procedure {procedure} failed: {status} - {message}")]
    RpcFailed {
        /// Name of the remote procedure.
        procedure: String,
        /// HTTP status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// Rate limited.
    #[error("Backend rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Entity not found on the backend.
    #[error("{level} not found on backend: {id}")]
    NotFound {
        /// Hierarchy level (or "plan").
        level: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// The connection could not be established; the request never reached the backend.
    #[error("Could not connect to backend: {message}")]
    ConnectFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with backend: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the backend.
    #[error("Invalid response from backend: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Sync planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Dependency resolution failed.
    #[error("Failed to resolve dependencies: {message}")]
    DependencyResolutionFailed {
        /// Description of the dependency issue.
        message: String,
    },

    /// The same temporary id is created more than once.
    #[error("Temporary id '{id}' is created more than once ({first} and {second})")]
    DuplicateTemporaryId {
        /// The repeated id.
        id: String,
        /// Level of the first creation.
        first: String,
        /// Level of the repeated creation.
        second: String,
    },

    /// Plan violates configured guardrails.
    #[error("Plan violates guardrails: {violations}")]
    GuardrailsViolated {
        /// Joined violation descriptions.
        violations: String,
    },
}

/// Synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An action failed while pushing the changeset.
    #[error("Failed to {action} {level} '{id}': {reason}")]
    ActionFailed {
        /// Action verb (create or delete).
        action: String,
        /// Hierarchy level.
        level: String,
        /// Entity identifier.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Sync was aborted before any backend write.
    #[error("Sync aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for fitplan operations.
pub type Result<T> = std::result::Result<T, FitplanError>;

impl FitplanError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend(
                BackendError::RateLimited { .. }
                    | BackendError::ConnectFailed { .. }
                    | BackendError::NetworkError { .. }
            ) | Self::State(StateError::LockFailed { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Backend(BackendError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Backend(BackendError::ConnectFailed { .. } | BackendError::NetworkError { .. }) => {
                Some(5)
            }
            Self::State(StateError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }

    /// Returns true if the backend is known not to have processed the request.
    ///
    /// Only these failures are safe to retry for calls that insert rows.
    #[must_use]
    pub const fn is_undelivered(&self) -> bool {
        matches!(
            self,
            Self::Backend(BackendError::RateLimited { .. } | BackendError::ConnectFailed { .. })
        )
    }

    /// Returns true if this error means the entity does not exist remotely.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(BackendError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl BackendError {
    /// Creates a remote procedure error.
    #[must_use]
    pub fn rpc(procedure: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::RpcFailed {
            procedure: procedure.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let rate_limited = FitplanError::Backend(BackendError::RateLimited { retry_after_secs: 7 });
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_delay_secs(), Some(7));

        let network = FitplanError::Backend(BackendError::network("connection reset"));
        assert!(network.is_retryable());
        assert_eq!(network.retry_delay_secs(), Some(5));

        assert!(!network.is_undelivered());

        let connect = FitplanError::Backend(BackendError::ConnectFailed {
            message: String::from("connection refused"),
        });
        assert!(connect.is_retryable());
        assert!(connect.is_undelivered());
        assert!(rate_limited.is_undelivered());

        let rpc = FitplanError::Backend(BackendError::rpc("create_plan_day", 400, "bad input"));
        assert!(!rpc.is_retryable());
        assert_eq!(rpc.retry_delay_secs(), None);
    }

    #[test]
    fn test_backend_message_is_surfaced() {
        let err = FitplanError::Backend(BackendError::rpc(
            "delete_plan_week",
            409,
            "week has logged workouts",
        ));
        let rendered = err.to_string();
        assert!(rendered.contains("delete_plan_week"));
        assert!(rendered.contains("week has logged workouts"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = FitplanError::Backend(BackendError::NotFound {
            level: String::from("session"),
            id: String::from("s1"),
        });
        assert!(err.is_not_found());
        assert!(!FitplanError::internal("boom").is_not_found());
    }
}
