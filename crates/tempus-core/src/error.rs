//! Error types for Tempus

use thiserror::Error;

/// Core Tempus errors
///
/// Gameplay-facing input is clamped rather than rejected, so these only
/// surface from decoding history payloads and loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TempusError {
    // History payload errors
    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Block tag mismatch: expected {expected:#06x}, found {found:#06x}")]
    TagMismatch { expected: u16, found: u16 },

    #[error("Missing block for producer tag {0:#06x}")]
    MissingBlock(u16),

    #[error("Invalid value in block {tag:#06x}: {reason}")]
    InvalidValue { tag: u16, reason: String },

    // Registry errors
    #[error("Unknown producer: {0}")]
    UnknownProducer(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for Tempus operations
pub type TempusResult<T> = Result<T, TempusError>;
