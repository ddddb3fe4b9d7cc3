//! Probe report types.
//!
//! A run accumulates its findings into a [`ProbeReport`], which the binary
//! prints as JSON when asked to and uses to pick an exit code.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, ErrorCode};
use crate::models::connection::ConnectionConfig;

/// Overall outcome of a probe run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Connected and all diagnostic queries completed.
    Success,
    /// The environment did not yield a usable configuration.
    ConfigError,
    /// The database client reported a structured error.
    DriverError,
    /// Anything else went wrong.
    #[default]
    UnexpectedError,
}

impl From<&AppError> for ProbeStatus {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Config(_) => ProbeStatus::ConfigError,
            AppError::Driver { .. } => ProbeStatus::DriverError,
            AppError::Unexpected(_) => ProbeStatus::UnexpectedError,
        }
    }
}

/// Details of the failure that ended a run.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    /// Error kind (e.g. "DRIVER_ERROR").
    pub kind: String,

    /// Client error code, driver errors only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,

    /// Human-readable error message.
    pub message: String,

    /// Remediation hint for known codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    /// Run identifier, also attached to log spans.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Total run time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Tool name and version.
    pub service: String,
}

/// Everything a single probe run found out.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Whether the run succeeded.
    pub success: bool,

    /// Outcome of the run.
    pub status: ProbeStatus,

    /// Resolved configuration (password omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Scalar returned by the arithmetic test query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<serde_json::Value>,

    /// Database selected on the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_database: Option<serde_json::Value>,

    /// Server version string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<serde_json::Value>,

    /// Table names in the order the server listed them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    /// Failure details, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,

    /// Whether a live connection was closed during cleanup.
    pub connection_closed: bool,

    /// Report metadata.
    pub meta: ReportMeta,
}

impl ProbeReport {
    /// Starts an empty report for a run.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            success: false,
            status: ProbeStatus::default(),
            connection: None,
            test_result: None,
            current_database: None,
            server_version: None,
            tables: None,
            error: None,
            connection_closed: false,
            meta: ReportMeta {
                run_id: run_id.into(),
                started_at: Utc::now(),
                duration_ms: None,
                service: format!("db-probe/{}", env!("CARGO_PKG_VERSION")),
            },
        }
    }

    /// Marks the run as successful.
    pub fn succeed(&mut self) {
        self.success = true;
        self.status = ProbeStatus::Success;
        self.error = None;
    }

    /// Records the error that ended the run.
    pub fn fail(&mut self, err: &AppError, hint: Option<&str>) {
        self.success = false;
        self.status = ProbeStatus::from(err);
        self.error = Some(ErrorDetails {
            kind: err.kind().to_string(),
            code: err.code().cloned(),
            message: err.message().to_string(),
            hint: hint.map(String::from),
        });
    }

    /// Sets the duration on the report.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.meta.duration_ms = Some(duration_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_unsuccessful() {
        let report = ProbeReport::new("run-1");
        assert!(!report.success);
        assert!(!report.connection_closed);
        assert_eq!(report.meta.run_id, "run-1");
    }

    #[test]
    fn test_fail_records_driver_details() {
        let mut report = ProbeReport::new("run-1");
        let err = AppError::driver(1049u32, "Unknown database 'shop'");
        report.fail(&err, Some("Check if database name exists"));

        assert_eq!(report.status, ProbeStatus::DriverError);
        let details = report.error.as_ref().unwrap();
        assert_eq!(details.code, Some(ErrorCode::Number(1049)));
        assert_eq!(details.hint.as_deref(), Some("Check if database name exists"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "driver_error");
        assert_eq!(json["error"]["code"], 1049);
    }

    #[test]
    fn test_succeed_clears_error() {
        let mut report = ProbeReport::new("run-1");
        report.fail(&AppError::Unexpected("boom".into()), None);
        report.succeed();
        assert!(report.success);
        assert_eq!(report.status, ProbeStatus::Success);
        assert!(report.error.is_none());
    }
}
