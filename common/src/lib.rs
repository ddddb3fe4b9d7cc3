//! Shared building blocks for the database probe.
//!
//! - `config`: environment-driven configuration loading
//! - `errors`: the error type every layer reports through
//! - `models`: connection configuration and the probe report
//! - `utils`: remediation hints and id generation

pub mod config;
pub mod errors;
pub mod models;
pub mod utils;
