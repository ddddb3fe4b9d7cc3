//! Unique ID generator.

use uuid::Uuid;

/// Generates identifiers for probe runs.
pub struct IdGenerator;

impl IdGenerator {
    /// Generates a unique run ID.
    ///
    /// # Returns
    /// A unique UUID string.
    pub fn run_id() -> String {
        Uuid::new_v4().to_string()
    }
}
