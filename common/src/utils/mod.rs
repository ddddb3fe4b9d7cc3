//! Utility functions and helpers.

pub mod error_hints;
pub mod id_generator;

// Re-export commonly used types
pub use error_hints::ErrorHints;
pub use id_generator::IdGenerator;
