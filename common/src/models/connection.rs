//! Connection configuration models.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use validator::Validate;

use crate::errors::AppError;

/// Text printed in place of a configured password.
pub const PASSWORD_HIDDEN: &str = "***hidden***";
/// Text printed when no password is configured.
pub const PASSWORD_NOT_SET: &str = "not set";

/// Database type enumeration.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// MySQL database.
    #[default]
    MySQL,
    /// PostgreSQL database.
    Postgres,
    /// SQLite database.
    SQLite,
}

/// The three diagnostic statements run against a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeQueries {
    /// Arithmetic sanity check, first column must be `2`.
    pub arithmetic: &'static str,
    /// Returns `(current_db, version)`.
    pub server_info: &'static str,
    /// One row per table, table name in the first column.
    pub list_tables: &'static str,
}

impl DbType {
    /// Returns the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbType::MySQL => Some(3306),
            DbType::Postgres => Some(5432),
            DbType::SQLite => None,
        }
    }

    /// Returns the default user for this database type.
    pub fn default_user(&self) -> Option<&'static str> {
        match self {
            DbType::MySQL => Some("root"),
            DbType::Postgres => Some("postgres"),
            DbType::SQLite => None,
        }
    }

    /// Human readable product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DbType::MySQL => "MySQL",
            DbType::Postgres => "PostgreSQL",
            DbType::SQLite => "SQLite",
        }
    }

    /// Whether this type talks to a server over the network.
    pub fn is_networked(&self) -> bool {
        !matches!(self, DbType::SQLite)
    }

    /// Diagnostic statements in this database's dialect.
    pub fn probe_queries(&self) -> ProbeQueries {
        match self {
            DbType::MySQL => ProbeQueries {
                arithmetic: "SELECT 1 + 1 AS result",
                server_info: "SELECT DATABASE() as current_db, VERSION() as version",
                list_tables: "SHOW TABLES",
            },
            DbType::Postgres => ProbeQueries {
                arithmetic: "SELECT 1 + 1 AS result",
                server_info: "SELECT current_database() AS current_db, version() AS version",
                list_tables: "SELECT table_name::text AS table_name \
                              FROM information_schema.tables \
                              WHERE table_schema = 'public'",
            },
            DbType::SQLite => ProbeQueries {
                arithmetic: "SELECT 1 + 1 AS result",
                server_info: "SELECT 'main' AS current_db, sqlite_version() AS version",
                list_tables: "SELECT name FROM sqlite_master WHERE type = 'table'",
            },
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::MySQL => write!(f, "mysql"),
            DbType::Postgres => write!(f, "postgres"),
            DbType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DbType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DbType::MySQL),
            "postgres" | "postgresql" => Ok(DbType::Postgres),
            "sqlite" => Ok(DbType::SQLite),
            other => Err(AppError::Config(format!(
                "DB_TYPE must be one of mysql, postgres, sqlite (got '{}')",
                other
            ))),
        }
    }
}

/// Resolved connection configuration.
///
/// Built once from the environment and not modified afterwards. The password
/// is never serialized and `Debug` masks it.
#[derive(Clone, Serialize, Validate)]
pub struct ConnectionConfig {
    /// Database type.
    pub db_type: DbType,
    /// Server host (network databases only).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "DB_HOST must not be empty"))]
    pub host: Option<String>,
    /// Server port (network databases only).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "DB_PORT must be between 1 and 65535"))]
    pub port: Option<u16>,
    /// Login user (network databases only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Login password, empty when not set.
    #[serde(skip_serializing)]
    pub password: String,
    /// Database name (network databases only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// SQLite file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "DB_PATH must not be empty"))]
    pub file_path: Option<String>,
}

impl ConnectionConfig {
    /// Masked representation of the password for display.
    pub fn password_display(&self) -> &'static str {
        if self.password.is_empty() {
            PASSWORD_NOT_SET
        } else {
            PASSWORD_HIDDEN
        }
    }

    /// `host:port` for network databases, the file path for SQLite.
    pub fn target(&self) -> String {
        match (&self.host, self.port, &self.file_path) {
            (Some(host), Some(port), _) => format!("{}:{}", host, port),
            (Some(host), None, _) => host.clone(),
            (None, _, Some(path)) => path.clone(),
            _ => String::from("<unknown>"),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password_display())
            .field("database", &self.database)
            .field("file_path", &self.file_path)
            .finish()
    }
}
