use std::fmt;

use serde::Serialize;

use crate::error::{ErrorKind, ServiceError};

/// How loudly a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; the request was simply not applicable.
    Info,
    /// The request was rejected and nothing changed.
    Warning,
    /// Something changed only partially or the wheel misbehaved.
    Error,
}

/// Message shown to the user after a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Presentation level.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Whether a `retry` can succeed without further user input.
    pub retryable: bool,
}

impl From<&ServiceError> for Notification {
    fn from(err: &ServiceError) -> Self {
        let severity = match err.kind() {
            ErrorKind::SpinGuard => Severity::Info,
            ErrorKind::Validation | ErrorKind::NotFound => Severity::Warning,
            ErrorKind::Persistence | ErrorKind::Internal => Severity::Error,
        };
        let message = match err {
            ServiceError::PersistenceFailure { applied: true, .. } => {
                format!("{err}; the change is kept in memory, use `retry` to save again")
            }
            ServiceError::PersistenceFailure { applied: false, .. } => {
                format!("{err}; use `retry` to read storage again")
            }
            _ => err.to_string(),
        };

        Self {
            severity,
            message,
            retryable: err.is_retryable(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{label}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::storage::StorageError;

    #[test]
    fn persistence_failures_suggest_retry() {
        let err = ServiceError::PersistenceFailure {
            revision: 2,
            applied: true,
            source: StorageError::GatewayClosed,
        };

        let notification = Notification::from(&err);

        assert_eq!(notification.severity, Severity::Error);
        assert!(notification.retryable);
        assert!(notification.message.contains("retry"));
    }

    #[test]
    fn validation_errors_are_warnings() {
        let notification = Notification::from(&ServiceError::DuplicateGroup("Fruits".into()));

        assert_eq!(notification.severity, Severity::Warning);
        assert!(!notification.retryable);
        assert_eq!(
            notification.to_string(),
            "[warning] group `Fruits` already exists"
        );
    }

    #[test]
    fn serializes_for_observers() {
        let value = serde_json::to_value(Notification::from(&ServiceError::AlreadySpinning)).unwrap();
        assert_eq!(value["severity"], "info");
        assert_eq!(value["retryable"], false);
    }
}
