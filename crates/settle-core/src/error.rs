//! Unified error types for the settlement crates
//!
//! [`SettleError`] covers the data-integrity failures the settlement core must
//! surface (overlapping responsibilities, unmatched period mutations, decimal
//! overflow) next to the usual I/O and parsing failures raised at the edges.
//! Filtered-out rows and join misses are *not* errors and never show up here.
//!
//! # Example
//!
//! ```ignore
//! use settle_core::{SettleError, SettleResult};
//!
//! fn settle(path: &str) -> SettleResult<()> {
//!     let readings = load_readings(path)?;
//!     run_pipeline(&readings)?;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ResponsibilityFlag;

/// Unified error type for all settlement operations.
#[derive(Error, Debug)]
pub enum SettleError {
    /// Two parties are designated responsible for the same grid area at the same instant.
    #[error(
        "responsibility overlap in grid area {grid_area} ({flag}): parties {first_party} and {second_party} both cover {at}"
    )]
    ResponsibilityOverlap {
        grid_area: String,
        flag: ResponsibilityFlag,
        first_party: String,
        second_party: String,
        at: DateTime<Utc>,
    },

    /// A responsibility interval that ends before it starts.
    #[error("invalid responsibility interval for party {party} in grid area {grid_area}: {detail}")]
    InvalidInterval {
        party: String,
        grid_area: String,
        detail: String,
    },

    /// A change event whose effective date falls outside every known period.
    #[error("no period of entity {entity_id} covers effective date {effective_date}")]
    UnmatchedEffectiveDate {
        entity_id: String,
        effective_date: DateTime<Utc>,
    },

    /// A period partition with gaps or overlaps.
    #[error("period partition of entity {entity_id} is broken: {detail}")]
    BrokenPartition { entity_id: String, detail: String },

    /// Decimal accumulation exceeded the representable range.
    #[error("quantity overflow while {context}")]
    QuantityOverflow { context: String },

    /// An attribute change that does not fit the entity schema.
    #[error("invalid value '{value}' for attribute {key}")]
    InvalidAttribute { key: String, value: String },

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file access, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SettleError.
pub type SettleResult<T> = Result<T, SettleError>;

impl SettleError {
    /// True for the integrity classes that must abort a batch rather than be logged and skipped.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            SettleError::ResponsibilityOverlap { .. }
                | SettleError::InvalidInterval { .. }
                | SettleError::UnmatchedEffectiveDate { .. }
                | SettleError::BrokenPartition { .. }
                | SettleError::QuantityOverflow { .. }
        )
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for SettleError {
    fn from(err: anyhow::Error) -> Self {
        SettleError::Other(format!("{err:#}"))
    }
}

impl From<String> for SettleError {
    fn from(s: String) -> Self {
        SettleError::Other(s)
    }
}

impl From<&str> for SettleError {
    fn from(s: &str) -> Self {
        SettleError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for SettleError {
    fn from(err: serde_json::Error) -> Self {
        SettleError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_message_names_both_parties() {
        let err = SettleError::ResponsibilityOverlap {
            grid_area: "500".into(),
            flag: ResponsibilityFlag::GridLoss,
            first_party: "S1".into(),
            second_party: "S2".into(),
            at: DateTime::from_timestamp(0, 0).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("S1"));
        assert!(msg.contains("S2"));
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SettleError = io_err.into();
        assert!(matches!(err, SettleError::Io(_)));
        assert!(!err.is_integrity_violation());
    }

    #[test]
    fn question_mark_operator() {
        fn inner() -> SettleResult<()> {
            Err(SettleError::Validation("test".into()))
        }

        fn outer() -> SettleResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
