//! Application error types.
//!
//! Every failure the probe can report is one of three kinds: a configuration
//! problem, a structured error from the database client, or anything else.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Error code reported by a database client.
///
/// MySQL and SQLite report numeric codes, PostgreSQL reports five-character
/// SQLSTATE values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// Numeric server/client error number.
    Number(u32),
    /// SQLSTATE class + subclass, e.g. `28P01`.
    SqlState(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{}", n),
            ErrorCode::SqlState(s) => write!(f, "{}", s),
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(n: u32) -> Self {
        ErrorCode::Number(n)
    }
}

/// Errors surfaced by the probe.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration could not be turned into a connection config.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Structured error raised by the database client.
    #[error("Database error {code}: {message}")]
    Driver { code: ErrorCode, message: String },

    /// Any other failure during the probe.
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    /// Builds a driver error from a code and message.
    pub fn driver(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        AppError::Driver {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error kind, used in the JSON report.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Driver { .. } => "DRIVER_ERROR",
            AppError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    /// Returns the driver error code, if any.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            AppError::Driver { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns the bare message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::Config(msg) | AppError::Unexpected(msg) => msg,
            AppError::Driver { message, .. } => message,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("invalid value for {}", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Config(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Number(2003).to_string(), "2003");
        assert_eq!(ErrorCode::SqlState("3D000".into()).to_string(), "3D000");
    }

    #[test]
    fn test_driver_error_accessors() {
        let err = AppError::driver(1045u32, "Access denied for user 'root'");
        assert_eq!(err.kind(), "DRIVER_ERROR");
        assert_eq!(err.code(), Some(&ErrorCode::Number(1045)));
        assert_eq!(err.message(), "Access denied for user 'root'");
        assert_eq!(
            err.to_string(),
            "Database error 1045: Access denied for user 'root'"
        );
    }

    #[test]
    fn test_non_driver_errors_have_no_code() {
        assert!(AppError::Config("bad port".into()).code().is_none());
        assert!(AppError::Unexpected("boom".into()).code().is_none());
    }
}
