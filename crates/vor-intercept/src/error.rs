//! Error types for the interceptor crate.

use thiserror::Error;
use vor_core::ConfigError;

/// Errors that can occur during interception.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// The interceptor configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// A bare column name matched descriptors on different tables or keys.
    #[error("column {column} is ambiguous between {}", candidates.join(", "))]
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },
}
