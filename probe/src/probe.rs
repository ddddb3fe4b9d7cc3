//! 连接探测服务模块
//!
//! Runs one probe: load configuration, connect, run the diagnostic queries,
//! report, and release the connection on every exit path.

use std::io::Write;
use std::time::Instant;

use serde_json::Value;
use tracing::Instrument;

use common::errors::{AppError, AppResult};
use common::models::connection::ConnectionConfig;
use common::models::report::ProbeReport;
use common::utils::{ErrorHints, IdGenerator};

use crate::driver::{DbConnection, Driver, Row};
use crate::report::{display_value, Reporter};

/// One-shot connectivity probe.
pub struct ConnectionProbe<D: Driver, W: Write> {
    driver: D,
    reporter: Reporter<W>,
}

impl<D: Driver, W: Write> ConnectionProbe<D, W> {
    /// Creates a probe using `driver` for connections and `reporter` for output.
    pub fn new(driver: D, reporter: Reporter<W>) -> Self {
        Self { driver, reporter }
    }

    /// Runs the probe with configuration read through `lookup`.
    ///
    /// Never returns an error: every failure is printed and recorded in the
    /// returned report.
    pub async fn run<F>(&mut self, lookup: F) -> ProbeReport
    where
        F: Fn(&str) -> Option<String>,
    {
        let run_id = IdGenerator::run_id();
        let span = tracing::info_span!("probe", run_id = %run_id);
        let started = Instant::now();
        let mut report = ProbeReport::new(run_id);

        async {
            self.reporter.start();
            match ConnectionConfig::from_lookup(lookup) {
                Ok(config) => self.probe(&config, &mut report).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Configuration rejected");
                    self.reporter.failure(&e, None);
                    report.fail(&e, None);
                    self.reporter.nothing_to_close();
                }
            }
        }
        .instrument(span)
        .await;

        report.with_duration(started.elapsed().as_millis() as u64)
    }

    async fn probe(&mut self, config: &ConnectionConfig, report: &mut ProbeReport) {
        self.reporter.config(config);
        report.connection = Some(config.clone());

        // Absent until connect succeeds; cleanup is guarded on this.
        let mut connection: Option<D::Conn> = None;

        match self.exercise(config, &mut connection, report).await {
            Ok(()) => report.succeed(),
            Err(e) => {
                let hint = ErrorHints::for_error(config.db_type, &e);
                self.reporter.failure(&e, hint);
                report.fail(&e, hint);
            }
        }

        self.release(connection, report).await;
    }

    async fn exercise(
        &mut self,
        config: &ConnectionConfig,
        connection: &mut Option<D::Conn>,
        report: &mut ProbeReport,
    ) -> AppResult<()> {
        let conn = connection.insert(self.driver.connect(config).await?);
        if !conn.is_connected() {
            return Err(AppError::Unexpected(
                "connection was opened but does not report itself as live".into(),
            ));
        }
        self.reporter.connected();

        let queries = config.db_type.probe_queries();

        let row = conn
            .fetch_one(queries.arithmetic)
            .await?
            .ok_or_else(|| no_rows(queries.arithmetic))?;
        let result = column(row, 0);
        tracing::info!(result = %display_value(&result), "Test query finished");
        self.reporter.test_result(&result);
        report.test_result = Some(result);

        let row = conn
            .fetch_one(queries.server_info)
            .await?
            .ok_or_else(|| no_rows(queries.server_info))?;
        let mut fields = row.into_iter();
        let current_db = fields.next().unwrap_or(Value::Null);
        let version = fields.next().unwrap_or(Value::Null);
        self.reporter.server_info(config.db_type, &current_db, &version);
        report.current_database = Some(current_db);
        report.server_version = Some(version);

        let tables: Vec<String> = conn
            .fetch_all(queries.list_tables)
            .await?
            .into_iter()
            .map(|row| display_value(&column(row, 0)))
            .collect();
        tracing::info!(count = tables.len(), "Listed tables");
        self.reporter.tables(&tables);
        report.tables = Some(tables);

        Ok(())
    }

    /// Closes the connection if one is live. Prints exactly one closure line.
    async fn release(&mut self, connection: Option<D::Conn>, report: &mut ProbeReport) {
        match connection {
            Some(mut conn) if conn.is_connected() => match conn.close().await {
                Ok(()) => {
                    report.connection_closed = true;
                    self.reporter.closed();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Closing the connection failed");
                    self.reporter.close_failed(&e);
                }
            },
            _ => self.reporter.nothing_to_close(),
        }
    }
}

fn column(row: Row, idx: usize) -> Value {
    row.into_iter().nth(idx).unwrap_or(Value::Null)
}

fn no_rows(sql: &str) -> AppError {
    AppError::Unexpected(format!("query returned no rows: {}", sql))
}
