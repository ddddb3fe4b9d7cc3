//! Data models shared by the probe.

pub mod connection;
pub mod report;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DbType, ProbeQueries};
pub use report::{ErrorDetails, ProbeReport, ProbeStatus, ReportMeta};
