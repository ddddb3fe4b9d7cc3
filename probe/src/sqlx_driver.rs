//! sqlx-backed database driver.
//!
//! Opens a single (unpooled) connection for MySQL, PostgreSQL or SQLite and
//! translates sqlx errors into coded driver errors.

use std::io;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::error::DatabaseError;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Executor, Row as _};

use common::errors::{AppError, AppResult, ErrorCode};
use common::models::connection::{ConnectionConfig, DbType};

use crate::driver::{DbConnection, Driver, Row};

/// MySQL client error: can't connect to server.
const CR_CONN_HOST_ERROR: u32 = 2003;
/// MySQL client error: unknown server host.
const CR_UNKNOWN_HOST: u32 = 2005;
/// MySQL client error: lost connection during query.
const CR_SERVER_LOST: u32 = 2013;
/// MySQL client error: SSL connection error.
const CR_SSL_CONNECTION_ERROR: u32 = 2026;

/// SQLSTATE: client unable to establish connection.
const SQLSTATE_UNABLE_TO_CONNECT: &str = "08001";
/// SQLSTATE: connection failure.
const SQLSTATE_CONNECTION_FAILURE: &str = "08006";

/// Driver that opens connections through sqlx.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlxDriver;

/// Open connection for one of the supported database types.
enum DatabaseConnection {
    MySQL(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

/// A connection opened by [`SqlxDriver`].
pub struct SqlxConnection {
    db_type: DbType,
    target: String,
    /// `None` once closed.
    inner: Option<DatabaseConnection>,
}

#[async_trait]
impl Driver for SqlxDriver {
    type Conn = SqlxConnection;

    async fn connect(&self, config: &ConnectionConfig) -> AppResult<SqlxConnection> {
        let target = config.target();
        tracing::info!(db_type = %config.db_type, addr = %target, "Opening connection");

        let inner = match config.db_type {
            DbType::MySQL => {
                resolve_host(config).await?;
                let conn = mysql_options(config)?
                    .connect()
                    .await
                    .map_err(|e| classify(config.db_type, &target, e, true))?;
                DatabaseConnection::MySQL(conn)
            }
            DbType::Postgres => {
                resolve_host(config).await?;
                let conn = postgres_options(config)?
                    .connect()
                    .await
                    .map_err(|e| classify(config.db_type, &target, e, true))?;
                DatabaseConnection::Postgres(conn)
            }
            DbType::SQLite => {
                let conn = sqlite_options(config)?
                    .connect()
                    .await
                    .map_err(|e| classify(config.db_type, &target, e, true))?;
                DatabaseConnection::SQLite(conn)
            }
        };

        tracing::info!(db_type = %config.db_type, addr = %target, "Connection established");
        Ok(SqlxConnection {
            db_type: config.db_type,
            target,
            inner: Some(inner),
        })
    }
}

impl SqlxConnection {
    fn inner_mut(&mut self) -> AppResult<&mut DatabaseConnection> {
        self.inner
            .as_mut()
            .ok_or_else(|| AppError::Unexpected("connection is already closed".into()))
    }
}

#[async_trait]
impl DbConnection for SqlxConnection {
    fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    async fn fetch_one(&mut self, sql: &str) -> AppResult<Option<Row>> {
        tracing::debug!(sql, "Fetching one row");
        let result: Result<Option<Row>, sqlx::Error> = match self.inner_mut()? {
            DatabaseConnection::MySQL(conn) => conn
                .fetch_optional(sql)
                .await
                .map(|row| row.as_ref().map(mysql_row)),
            DatabaseConnection::Postgres(conn) => conn
                .fetch_optional(sql)
                .await
                .map(|row| row.as_ref().map(postgres_row)),
            DatabaseConnection::SQLite(conn) => conn
                .fetch_optional(sql)
                .await
                .map(|row| row.as_ref().map(sqlite_row)),
        };
        result.map_err(|e| classify(self.db_type, &self.target, e, false))
    }

    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>> {
        tracing::debug!(sql, "Fetching all rows");
        let result: Result<Vec<Row>, sqlx::Error> = match self.inner_mut()? {
            DatabaseConnection::MySQL(conn) => conn
                .fetch_all(sql)
                .await
                .map(|rows| rows.iter().map(mysql_row).collect()),
            DatabaseConnection::Postgres(conn) => conn
                .fetch_all(sql)
                .await
                .map(|rows| rows.iter().map(postgres_row).collect()),
            DatabaseConnection::SQLite(conn) => conn
                .fetch_all(sql)
                .await
                .map(|rows| rows.iter().map(sqlite_row).collect()),
        };
        result.map_err(|e| classify(self.db_type, &self.target, e, false))
    }

    async fn close(&mut self) -> AppResult<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        let result = match inner {
            DatabaseConnection::MySQL(conn) => conn.close().await,
            DatabaseConnection::Postgres(conn) => conn.close().await,
            DatabaseConnection::SQLite(conn) => conn.close().await,
        };
        tracing::info!(db_type = %self.db_type, addr = %self.target, "Connection closed");
        result.map_err(|e| classify(self.db_type, &self.target, e, false))
    }
}

// ============== Connect Options ==============

fn network_target(config: &ConnectionConfig) -> AppResult<(&str, u16)> {
    let host = config.host.as_deref().ok_or_else(|| {
        AppError::Config(format!("{} requires host", config.db_type.display_name()))
    })?;
    let port = config
        .port
        .or_else(|| config.db_type.default_port())
        .ok_or_else(|| {
            AppError::Config(format!("{} requires port", config.db_type.display_name()))
        })?;
    Ok((host, port))
}

fn mysql_options(config: &ConnectionConfig) -> AppResult<MySqlConnectOptions> {
    let (host, port) = network_target(config)?;
    let mut options = MySqlConnectOptions::new().host(host).port(port);
    if let Some(user) = config.user.as_deref() {
        options = options.username(user);
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if let Some(database) = config.database.as_deref() {
        options = options.database(database);
    }
    Ok(options)
}

fn postgres_options(config: &ConnectionConfig) -> AppResult<PgConnectOptions> {
    let (host, port) = network_target(config)?;
    let mut options = PgConnectOptions::new().host(host).port(port);
    if let Some(user) = config.user.as_deref() {
        options = options.username(user);
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if let Some(database) = config.database.as_deref() {
        options = options.database(database);
    }
    Ok(options)
}

fn sqlite_options(config: &ConnectionConfig) -> AppResult<SqliteConnectOptions> {
    let path = config
        .file_path
        .as_deref()
        .ok_or_else(|| AppError::Config("SQLite requires DB_PATH".into()))?;
    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true))
}

/// Resolves the host up front so an unknown host gets its own error code
/// instead of a generic I/O failure.
async fn resolve_host(config: &ConnectionConfig) -> AppResult<()> {
    let (host, port) = network_target(config)?;
    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => {
            if addrs.next().is_some() {
                Ok(())
            } else {
                Err(unknown_host(config.db_type, host, "no addresses found"))
            }
        }
        Err(e) => Err(unknown_host(config.db_type, host, &e.to_string())),
    }
}

// ============== Error Classification ==============

fn unknown_host(db_type: DbType, host: &str, reason: &str) -> AppError {
    tracing::warn!(db_type = %db_type, host, reason, "Host resolution failed");
    match db_type {
        DbType::MySQL => AppError::driver(
            CR_UNKNOWN_HOST,
            format!("Unknown MySQL server host '{}' ({})", host, reason),
        ),
        _ => AppError::driver(
            ErrorCode::SqlState(SQLSTATE_UNABLE_TO_CONNECT.into()),
            format!("could not translate host name \"{}\" to address: {}", host, reason),
        ),
    }
}

/// Maps a sqlx error to a driver error where the client has a code for it.
fn classify(db_type: DbType, target: &str, err: sqlx::Error, connecting: bool) -> AppError {
    let classified = match err {
        sqlx::Error::Database(db_err) => database_error(db_type, db_err.as_ref()),
        sqlx::Error::Io(io_err) => io_error(db_type, target, &io_err, connecting),
        sqlx::Error::Tls(tls_err) => match db_type {
            DbType::MySQL => AppError::driver(
                CR_SSL_CONNECTION_ERROR,
                format!("SSL connection error: {}", tls_err),
            ),
            DbType::Postgres => AppError::driver(
                ErrorCode::SqlState(SQLSTATE_UNABLE_TO_CONNECT.into()),
                format!("SSL error: {}", tls_err),
            ),
            DbType::SQLite => AppError::Unexpected(tls_err.to_string()),
        },
        other => AppError::Unexpected(other.to_string()),
    };
    tracing::warn!(db_type = %db_type, addr = target, error = %classified, "Database call failed");
    classified
}

fn database_error(db_type: DbType, err: &(dyn DatabaseError + 'static)) -> AppError {
    let message = err.message().to_string();
    let code = match db_type {
        DbType::MySQL => err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| ErrorCode::Number(u32::from(e.number()))),
        DbType::Postgres => err.code().map(|c| ErrorCode::SqlState(c.into_owned())),
        DbType::SQLite => err
            .code()
            .and_then(|c| c.parse::<u32>().ok())
            .map(ErrorCode::Number),
    };
    match code {
        Some(code) => AppError::Driver { code, message },
        None => AppError::Unexpected(message),
    }
}

fn io_error(db_type: DbType, target: &str, err: &io::Error, connecting: bool) -> AppError {
    match (db_type, connecting) {
        (DbType::MySQL, true) => AppError::driver(
            CR_CONN_HOST_ERROR,
            format!("Can't connect to MySQL server on '{}' ({})", target, err),
        ),
        (DbType::MySQL, false) => AppError::driver(
            CR_SERVER_LOST,
            format!("Lost connection to MySQL server during query ({})", err),
        ),
        (DbType::Postgres, true) => AppError::driver(
            ErrorCode::SqlState(SQLSTATE_UNABLE_TO_CONNECT.into()),
            format!("connection to server at {} failed: {}", target, err),
        ),
        (DbType::Postgres, false) => AppError::driver(
            ErrorCode::SqlState(SQLSTATE_CONNECTION_FAILURE.into()),
            format!("connection to server at {} was lost: {}", target, err),
        ),
        (DbType::SQLite, _) => AppError::Unexpected(format!("I/O error on {}: {}", target, err)),
    }
}

// ============== Row Decoding ==============

/// Tries each listed Rust type in turn and converts the first one that
/// decodes. NULL decodes as `Value::Null` under any type.
macro_rules! decode_column {
    ($row:expr, $idx:expr, $($ty:ty => $conv:expr),+ $(,)?) => {{
        $(
            if let Ok(value) = $row.try_get::<Option<$ty>, _>($idx) {
                return value.map($conv).unwrap_or(Value::Null);
            }
        )+
        tracing::debug!(column = $idx, "Column type not decodable, reporting NULL");
        Value::Null
    }};
}

fn bytes_to_value(bytes: Vec<u8>) -> Value {
    Value::String(String::from_utf8_lossy(&bytes).into_owned())
}

fn mysql_value(row: &MySqlRow, idx: usize) -> Value {
    decode_column!(row, idx,
        i64 => Value::from,
        u64 => Value::from,
        f64 => Value::from,
        String => Value::from,
        Vec<u8> => bytes_to_value,
    )
}

fn postgres_value(row: &PgRow, idx: usize) -> Value {
    decode_column!(row, idx,
        i64 => Value::from,
        i32 => Value::from,
        i16 => Value::from,
        f64 => Value::from,
        bool => Value::from,
        String => Value::from,
        Vec<u8> => bytes_to_value,
    )
}

fn sqlite_value(row: &SqliteRow, idx: usize) -> Value {
    decode_column!(row, idx,
        i64 => Value::from,
        f64 => Value::from,
        String => Value::from,
        Vec<u8> => bytes_to_value,
    )
}

fn mysql_row(row: &MySqlRow) -> Row {
    (0..row.len()).map(|idx| mysql_value(row, idx)).collect()
}

fn postgres_row(row: &PgRow) -> Row {
    (0..row.len()).map(|idx| postgres_value(row, idx)).collect()
}

fn sqlite_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|idx| sqlite_value(row, idx)).collect()
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn mysql_config() -> ConnectionConfig {
        ConnectionConfig {
            db_type: DbType::MySQL,
            host: Some("db.internal".into()),
            port: Some(3307),
            user: Some("app".into()),
            password: "s3cret".into(),
            database: Some("shop".into()),
            file_path: None,
        }
    }

    fn sqlite_config(path: &str) -> ConnectionConfig {
        ConnectionConfig {
            db_type: DbType::SQLite,
            host: None,
            port: None,
            user: None,
            password: String::new(),
            database: None,
            file_path: Some(path.to_string()),
        }
    }

    fn temp_sqlite_path() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir()
            .join(format!("db-probe-{}-{}.sqlite", std::process::id(), nanos))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_mysql_options() {
        let options = mysql_options(&mysql_config()).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("shop"));
    }

    #[test]
    fn test_mysql_options_require_host() {
        let mut config = mysql_config();
        config.host = None;
        assert!(matches!(mysql_options(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_refused_connection_maps_to_2003() {
        let err = classify(
            DbType::MySQL,
            "localhost:3306",
            sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            true,
        );
        assert_eq!(err.code(), Some(&ErrorCode::Number(2003)));
        assert!(err.message().contains("localhost:3306"));
    }

    #[test]
    fn test_io_error_after_connect_is_server_lost() {
        let err = classify(
            DbType::MySQL,
            "localhost:3306",
            sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset)),
            false,
        );
        assert_eq!(err.code(), Some(&ErrorCode::Number(2013)));
    }

    #[test]
    fn test_postgres_refused_connection_maps_to_sqlstate() {
        let err = classify(
            DbType::Postgres,
            "localhost:5432",
            sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            true,
        );
        assert_eq!(err.code(), Some(&ErrorCode::SqlState("08001".into())));
    }

    #[test]
    fn test_protocol_error_is_unexpected() {
        let err = classify(
            DbType::MySQL,
            "localhost:3306",
            sqlx::Error::Protocol("bad packet".into()),
            false,
        );
        assert!(matches!(err, AppError::Unexpected(ref msg) if msg.contains("bad packet")));
    }

    #[test]
    fn test_unknown_host_codes() {
        let mysql = unknown_host(DbType::MySQL, "nowhere.invalid", "lookup failed");
        assert_eq!(mysql.code(), Some(&ErrorCode::Number(2005)));
        let postgres = unknown_host(DbType::Postgres, "nowhere.invalid", "lookup failed");
        assert_eq!(postgres.code(), Some(&ErrorCode::SqlState("08001".into())));
    }

    #[tokio::test]
    async fn test_connect_to_unresolvable_host_is_2005() {
        let mut config = mysql_config();
        config.host = Some("no-such-host.invalid".into());
        let err = match SqlxDriver.connect(&config).await {
            Ok(_) => panic!("connect to an unresolvable host should fail"),
            Err(e) => e,
        };
        assert_eq!(err.code(), Some(&ErrorCode::Number(2005)));
        assert!(err.message().contains("no-such-host.invalid"));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_2003() {
        let mut config = mysql_config();
        config.host = Some("127.0.0.1".into());
        config.port = Some(1);
        let err = match SqlxDriver.connect(&config).await {
            Ok(_) => panic!("connect to a closed port should fail"),
            Err(e) => e,
        };
        assert_eq!(err.code(), Some(&ErrorCode::Number(2003)));
        assert!(err.message().contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let path = temp_sqlite_path();
        let mut conn = SqlxDriver.connect(&sqlite_config(&path)).await.unwrap();
        assert!(conn.is_connected());

        conn.fetch_all("CREATE TABLE users (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        conn.fetch_all("CREATE TABLE orders (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();

        let queries = DbType::SQLite.probe_queries();
        let row = conn.fetch_one(queries.arithmetic).await.unwrap().unwrap();
        assert_eq!(row, vec![Value::from(2)]);

        let tables: Vec<Value> = conn
            .fetch_all(queries.list_tables)
            .await
            .unwrap()
            .into_iter()
            .map(|mut row| row.remove(0))
            .collect();
        assert_eq!(tables, vec![Value::from("users"), Value::from("orders")]);

        conn.close().await.unwrap();
        assert!(!conn.is_connected());
        assert!(conn.fetch_one("SELECT 1").await.is_err());

        let _ = std::fs::remove_file(&path);
    }
}
