//! Remediation hints for well-known database error codes.

use crate::errors::{AppError, ErrorCode};
use crate::models::connection::DbType;

/// Looks up remediation hints for driver errors.
pub struct ErrorHints;

/// MySQL error numbers and their hints.
const MYSQL_HINTS: [(u32, &str); 4] = [
    (2003, "Check if MySQL server is running"),
    (1045, "Check username/password credentials"),
    (1049, "Check if database name exists"),
    (2005, "Check host address"),
];

/// PostgreSQL SQLSTATE codes and their hints.
const POSTGRES_HINTS: [(&str, &str); 3] = [
    ("08001", "Check if PostgreSQL server is running"),
    ("28P01", "Check username/password credentials"),
    ("3D000", "Check if database name exists"),
];

/// SQLite primary result codes and their hints.
const SQLITE_HINTS: [(u32, &str); 2] = [
    (14, "Check the database file path and its permissions"),
    (26, "Check that the file is a SQLite database"),
];

impl ErrorHints {
    /// Returns the hint for a code reported by the given database type.
    ///
    /// Codes outside the table have no hint.
    pub fn for_code(db_type: DbType, code: &ErrorCode) -> Option<&'static str> {
        match (db_type, code) {
            (DbType::MySQL, ErrorCode::Number(n)) => lookup(&MYSQL_HINTS, n),
            (DbType::Postgres, ErrorCode::SqlState(state)) => POSTGRES_HINTS
                .iter()
                .find(|(s, _)| s.eq_ignore_ascii_case(state))
                .map(|(_, hint)| *hint),
            // Extended result codes carry the primary code in the low byte.
            (DbType::SQLite, ErrorCode::Number(n)) => lookup(&SQLITE_HINTS, &(n & 0xff)),
            _ => None,
        }
    }

    /// Returns the hint for an error, driver errors only.
    pub fn for_error(db_type: DbType, err: &AppError) -> Option<&'static str> {
        err.code().and_then(|code| Self::for_code(db_type, code))
    }
}

fn lookup(table: &[(u32, &'static str)], code: &u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(c, _)| c == code)
        .map(|(_, hint)| *hint)
}
