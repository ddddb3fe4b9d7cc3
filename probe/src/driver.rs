//! Database client abstraction.
//!
//! The probe only needs to open a connection, run a statement and read back
//! rows, then close. These traits are that surface; `sqlx_driver` implements
//! them on top of sqlx and the tests implement them in memory.

use async_trait::async_trait;
use serde_json::Value;

use common::errors::AppResult;
use common::models::connection::ConnectionConfig;

/// A result row, one JSON value per column in select order.
pub type Row = Vec<Value>;

/// Opens connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Connection type produced by this driver.
    type Conn: DbConnection;

    /// Opens a connection described by `config`.
    ///
    /// Failures reported by the client carry a code and come back as
    /// `AppError::Driver`.
    async fn connect(&self, config: &ConnectionConfig) -> AppResult<Self::Conn>;
}

/// A single open connection.
#[async_trait]
pub trait DbConnection: Send {
    /// Whether the connection is open.
    fn is_connected(&self) -> bool;

    /// Executes `sql` and returns the first row, if any.
    async fn fetch_one(&mut self, sql: &str) -> AppResult<Option<Row>>;

    /// Executes `sql` and returns every row.
    async fn fetch_all(&mut self, sql: &str) -> AppResult<Vec<Row>>;

    /// Closes the connection. Afterwards `is_connected` returns false.
    async fn close(&mut self) -> AppResult<()>;
}
