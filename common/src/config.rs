//! Environment-driven configuration.
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file by the binary). Loading goes through a lookup function so the
//! same code runs against `std::env` in production and plain maps in tests.

use std::str::FromStr;

use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::connection::{ConnectionConfig, DbType};

pub const ENV_DB_TYPE: &str = "DB_TYPE";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DB_PORT: &str = "DB_PORT";
pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_PROBE_OUTPUT: &str = "PROBE_OUTPUT";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_DATABASE: &str = "your_database";
pub const DEFAULT_SQLITE_PATH: &str = "./database.sqlite";

/// Reads a variable from the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// How the final report is written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Line-oriented console report.
    #[default]
    Text,
    /// A single JSON document at the end of the run.
    Json,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::Config(format!(
                "PROBE_OUTPUT must be 'text' or 'json' (got '{}')",
                other
            ))),
        }
    }
}

/// Process-level settings that are not part of the connection itself.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Report output format.
    pub output: OutputFormat,
}

impl AppConfig {
    /// Loads the app config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Loads the app config through `lookup`.
    ///
    /// An unrecognised output format falls back to text so the probe still
    /// prints something useful.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let output = match lookup(ENV_PROBE_OUTPUT) {
            Some(raw) => raw.parse::<OutputFormat>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to text output");
                OutputFormat::Text
            }),
            None => OutputFormat::Text,
        };
        Self { output }
    }
}

impl ConnectionConfig {
    /// Builds the connection config through `lookup`.
    ///
    /// Unset variables take their documented defaults. A `DB_PORT` that is
    /// present but not a valid port number is a configuration error.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_type = match lookup(ENV_DB_TYPE) {
            Some(raw) => raw.parse::<DbType>()?,
            None => DbType::default(),
        };
        let password = lookup(ENV_DB_PASSWORD).unwrap_or_default();

        let config = if db_type.is_networked() {
            ConnectionConfig {
                db_type,
                host: Some(lookup(ENV_DB_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string())),
                port: match lookup(ENV_DB_PORT) {
                    Some(raw) => Some(parse_port(&raw)?),
                    None => db_type.default_port(),
                },
                user: lookup(ENV_DB_USER).or_else(|| db_type.default_user().map(String::from)),
                password,
                database: match lookup(ENV_DB_NAME) {
                    Some(name) if name.is_empty() => None,
                    Some(name) => Some(name),
                    None => Some(DEFAULT_DATABASE.to_string()),
                },
                file_path: None,
            }
        } else {
            ConnectionConfig {
                db_type,
                host: None,
                port: None,
                user: None,
                password,
                database: None,
                file_path: Some(
                    lookup(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
                ),
            }
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_port(raw: &str) -> AppResult<u16> {
    raw.trim().parse::<u16>().map_err(|_| {
        AppError::Config(format!(
            "DB_PORT must be an integer between 1 and 65535 (got '{}')",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ConnectionConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_type, DbType::MySQL);
        assert_eq!(config.host.as_deref(), Some("localhost"));
        assert_eq!(config.user.as_deref(), Some("root"));
        assert_eq!(config.password, "");
        assert_eq!(config.database.as_deref(), Some("your_database"));
        assert_eq!(config.port, Some(3306));
        assert_eq!(config.password_display(), "not set");
    }

    #[test]
    fn test_port_from_env() {
        let config = ConnectionConfig::from_lookup(lookup_from(&[("DB_PORT", "5432")])).unwrap();
        assert_eq!(config.port, Some(5432));
    }

    #[test]
    fn test_non_numeric_port_is_config_error() {
        let err = ConnectionConfig::from_lookup(lookup_from(&[("DB_PORT", "abc")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("abc")));
    }

    #[test]
    fn test_out_of_range_ports_are_rejected() {
        for raw in ["0", "65536", "-1", ""] {
            let result = ConnectionConfig::from_lookup(lookup_from(&[("DB_PORT", raw)]));
            assert!(
                matches!(result, Err(AppError::Config(_))),
                "port {:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = ConnectionConfig::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_NAME", "shop"),
        ]))
        .unwrap();
        assert_eq!(config.host.as_deref(), Some("db.internal"));
        assert_eq!(config.user.as_deref(), Some("app"));
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.database.as_deref(), Some("shop"));
        assert_eq!(config.password_display(), "***hidden***");
    }

    #[test]
    fn test_empty_host_is_rejected() {
        let err = ConnectionConfig::from_lookup(lookup_from(&[("DB_HOST", "")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("DB_HOST")));
    }

    #[test]
    fn test_empty_database_name_means_none() {
        let config = ConnectionConfig::from_lookup(lookup_from(&[("DB_NAME", "")])).unwrap();
        assert_eq!(config.database, None);
    }

    #[test]
    fn test_postgres_defaults() {
        let config =
            ConnectionConfig::from_lookup(lookup_from(&[("DB_TYPE", "postgres")])).unwrap();
        assert_eq!(config.db_type, DbType::Postgres);
        assert_eq!(config.user.as_deref(), Some("postgres"));
        assert_eq!(config.port, Some(5432));
    }

    #[test]
    fn test_sqlite_uses_path() {
        let config = ConnectionConfig::from_lookup(lookup_from(&[
            ("DB_TYPE", "sqlite"),
            ("DB_HOST", "ignored"),
            ("DB_PORT", "abc"),
        ]))
        .unwrap();
        assert_eq!(config.file_path.as_deref(), Some("./database.sqlite"));
        assert_eq!(config.host, None);
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_unknown_db_type_is_config_error() {
        let err = ConnectionConfig::from_lookup(lookup_from(&[("DB_TYPE", "oracle")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_output_format() {
        assert_eq!(AppConfig::from_lookup(lookup_from(&[])).output, OutputFormat::Text);
        assert_eq!(
            AppConfig::from_lookup(lookup_from(&[("PROBE_OUTPUT", "JSON")])).output,
            OutputFormat::Json
        );
        assert_eq!(
            AppConfig::from_lookup(lookup_from(&[("PROBE_OUTPUT", "yaml")])).output,
            OutputFormat::Text
        );
    }
}
