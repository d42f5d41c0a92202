//! Error types for the Granary pipeline.
//!
//! Only conditions the caller has to fix are errors: duplicate join keys,
//! invalid weight sets and malformed input tables. Numeric edge cases and
//! validation failures are resolved to values and never surface here.

use thiserror::Error;

use crate::types::Period;

/// The main error type for Granary operations.
#[derive(Debug, Error)]
pub enum GranaryError {
    /// A source table contains the same normalized join key more than once.
    #[error(
        "Duplicate key in {table} source: \
         region={region}, period={period}, commodity={commodity}"
    )]
    DuplicateKey {
        /// Name of the offending source table.
        table: String,
        /// Normalized region name (`*` for a region-wide wildcard).
        region: String,
        /// Period of the duplicated row.
        period: Period,
        /// Normalized commodity (`*` for a commodity-wide wildcard).
        commodity: String,
    },

    /// Weights are negative, non-finite, or do not sum to 1.0.
    #[error("Invalid weight config: {0}")]
    InvalidWeightConfig(String),

    /// A configuration value outside its documented domain.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from a source table.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl From<String> for GranaryError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for GranaryError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for Granary operations.
pub type Result<T> = std::result::Result<T, GranaryError>;
