//! # Application Error Types
//!
//! This module defines the error types shared by the catalog matcher, the capture
//! session state machine and the ingredient resolver. Collaborator failures are
//! classified here so each component can decide whether to degrade or surface them.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (wizard fields, barcodes, etc.)
    Validation(String),
    /// Product catalog errors (search, barcode lookup)
    Catalog(String),
    /// Inventory store errors (insert, delete, list)
    Inventory(String),
    /// Substitution service errors
    Substitution(String),
    /// AI image scan or category detection errors
    Scan(String),
    /// A remote call exceeded its deadline
    Timeout(String),
    /// The capture session was cancelled while the operation was in flight
    Cancelled(String),
    /// Internal application errors
    Internal(String),
}

impl AppError {
    /// Whether the user can reasonably retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Catalog(_)
                | AppError::Inventory(_)
                | AppError::Substitution(_)
                | AppError::Scan(_)
                | AppError::Timeout(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Catalog(msg) => write!(f, "[CATALOG] {}", msg),
            AppError::Inventory(msg) => write!(f, "[INVENTORY] {}", msg),
            AppError::Substitution(msg) => write!(f, "[SUBSTITUTION] {}", msg),
            AppError::Scan(msg) => write!(f, "[SCAN] {}", msg),
            AppError::Timeout(msg) => write!(f, "[TIMEOUT] {}", msg),
            AppError::Cancelled(msg) => write!(f, "[CANCELLED] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(format!("Invalid JSON document: {}", err))
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the crate
pub mod error_logging {
    use tracing::{error, warn};

    /// Log a degraded collaborator call. These never abort the caller, so they log at warn.
    pub fn log_collaborator_error(
        error: &impl std::fmt::Display,
        collaborator: &str,
        operation: &str,
        subject: Option<&str>,
    ) {
        warn!(
            error = %error,
            collaborator = %collaborator,
            operation = %operation,
            subject = ?subject,
            "Collaborator call failed, degrading"
        );
    }

    /// Log a rejected inventory insert with the session that attempted it
    pub fn log_commit_error(
        error: &impl std::fmt::Display,
        session_id: u64,
        item_name: Option<&str>,
        mode: &str,
    ) {
        error!(
            error = %error,
            session_id = %session_id,
            item_name = ?item_name,
            mode = %mode,
            "Inventory commit failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        session_id: Option<u64>,
        field: &str,
        input_value: Option<&str>,
    ) {
        warn!(
            error = %error,
            operation = %operation,
            session_id = ?session_id,
            field = %field,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 {
                format!("{}...", v.chars().take(100).collect::<String>())
            } else {
                v.to_string()
            }),
            "Validation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Inventory("insert rejected".to_string()).to_string(),
            "[INVENTORY] insert rejected"
        );
        assert_eq!(
            AppError::Timeout("5s".to_string()).to_string(),
            "[TIMEOUT] 5s"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Inventory("x".into()).is_retryable());
        assert!(AppError::Timeout("x".into()).is_retryable());
        assert!(!AppError::Validation("x".into()).is_retryable());
        assert!(!AppError::Cancelled("x".into()).is_retryable());
    }
}
