//! Console reporter.
//!
//! Writes the line-oriented report: configuration dump, connection status,
//! query results or error, closure confirmation. In JSON mode every line is
//! suppressed and `main` prints the collected `ProbeReport` instead.

use std::fmt::Display;
use std::io::Write;

use serde_json::Value;

use common::config::OutputFormat;
use common::errors::AppError;
use common::models::connection::ConnectionConfig;
use common::models::DbType;

/// Writes probe progress to a sink.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
    /// Set once the connection is confirmed live.
    connected: bool,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            connected: false,
        }
    }

    fn line(&mut self, text: impl Display) {
        if self.format != OutputFormat::Text {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!(error = %e, "Failed to write report line");
        }
    }

    pub fn start(&mut self) {
        self.line("🔍 Testing database connection...");
    }

    /// Prints the resolved configuration with the password masked.
    pub fn config(&mut self, config: &ConnectionConfig) {
        self.line(format!(
            "🔧 Current {} configuration:",
            config.db_type.display_name()
        ));
        if config.db_type.is_networked() {
            self.line(format!("Host: {}", optional(config.host.as_deref())));
            self.line(format!("User: {}", optional(config.user.as_deref())));
            self.line(format!("Database: {}", optional(config.database.as_deref())));
            self.line(format!(
                "Port: {}",
                config.port.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
            ));
            self.line(format!("Password: {}", config.password_display()));
        } else {
            let path = config
                .file_path
                .as_deref()
                .map(absolute_path)
                .unwrap_or_else(|| "-".into());
            self.line(format!("📁 Database file: {}", path));
        }
        self.line("---");
    }

    pub fn connected(&mut self) {
        self.connected = true;
        self.line("✅ Database connection established successfully!");
    }

    pub fn test_result(&mut self, value: &Value) {
        self.line(format!("📊 Test query result: {}", display_value(value)));
    }

    pub fn server_info(&mut self, db_type: DbType, current_db: &Value, version: &Value) {
        self.line(format!("📋 Current database: {}", display_value(current_db)));
        self.line(format!(
            "📋 {} version: {}",
            db_type.display_name(),
            display_value(version)
        ));
    }

    pub fn tables(&mut self, tables: &[String]) {
        let rendered = serde_json::to_string(tables).unwrap_or_else(|_| tables.join(", "));
        self.line(format!("📂 Available tables: {}", rendered));
    }

    /// Prints an error and, for known driver codes, its remediation hint.
    pub fn failure(&mut self, err: &AppError, hint: Option<&str>) {
        match err {
            AppError::Driver { code, message } => {
                if self.connected {
                    self.line("❌ Database error:");
                } else {
                    self.line("❌ Database connection failed:");
                }
                self.line(format!("Error code: {}", code));
                self.line(format!("Error message: {}", message));
                if let Some(hint) = hint {
                    self.line(format!("💡 Solution: {}", hint));
                }
            }
            AppError::Config(message) => {
                self.line(format!("❌ Invalid configuration: {}", message));
            }
            AppError::Unexpected(message) => {
                self.line(format!("❌ Unexpected error: {}", message));
            }
        }
    }

    pub fn closed(&mut self) {
        self.line("🔒 Connection closed successfully");
    }

    pub fn close_failed(&mut self, err: &AppError) {
        self.line(format!("🔒 Connection close reported an error: {}", err));
    }

    pub fn nothing_to_close(&mut self) {
        self.line("🔒 No open connection to close");
    }
}

/// Absolute form of `path` relative to the working directory, or the path
/// as given when that cannot be determined.
fn absolute_path(path: &str) -> String {
    std::path::absolute(path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.to_string())
}

fn optional(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Renders a column value without JSON quoting.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
