//! Error types for the ctxgen core library.
//!
//! This module defines the error type shared by every ctxgen crate for
//! configuration, selector and schema problems. Crate-specific failures
//! (I/O, parsing, shard execution) wrap it.

use thiserror::Error;

/// The main error type for ctxgen-core operations.
#[derive(Debug, Error)]
pub enum CtxgenError {
    /// Error during configuration parsing or validation.
    #[error("Configuration error: {message}")]
    Config {
        /// A description of the configuration error.
        message: String,
    },

    /// A relation, polarity or context selector string was not recognized.
    #[error("Unrecognized {kind} selector: {value:?}")]
    UnknownSelector {
        /// Which selector family was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Row counts or columns disagree between parts of the same table.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        /// A description of the mismatch.
        message: String,
    },

    /// A history sequence would hold more values than its capacity.
    #[error("History length {length} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// The requested length.
        length: usize,
        /// The fixed capacity of the sequence.
        capacity: usize,
    },

    /// A padded sequence has a non-sentinel value past its logical length.
    #[error("Non-sentinel value {value} at slot {slot} beyond length {length}")]
    PaddingViolation {
        /// The offending slot.
        slot: usize,
        /// The value found in that slot.
        value: i64,
        /// The logical length of the sequence.
        length: usize,
    },
}

impl CtxgenError {
    /// Builds a [`CtxgenError::Config`] from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Builds a [`CtxgenError::SchemaMismatch`] from any message.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}

/// A specialized Result type for ctxgen-core operations.
pub type Result<T> = std::result::Result<T, CtxgenError>;
