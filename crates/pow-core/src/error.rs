//! Error types for proof-of-work validation and difficulty calculation.

use thiserror::Error;

/// Errors raised by the proof-of-work and retarget engines.
#[derive(Debug, Error)]
pub enum PowError {
    /// A block claims to be older than the last block we trust.
    #[error("block timestamp is {behind}s before the last reliable block")]
    InvalidTimestamp { behind: i64 },

    /// A block claims less work than the DoS minimum allows.
    #[error("difficulty {got:#010x} is easier than allowed minimum {min_allowed:#010x}")]
    InvalidDifficulty { got: u32, min_allowed: u32 },

    /// A numeric conversion could not be done exactly.
    #[error("value {value} cannot be represented without losing precision")]
    PrecisionLost { value: f64 },

    /// Checked integer arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,

    /// The header's nBits are outside the allowed target range.
    #[error("nBits {bits:#010x} below minimum work")]
    BelowMinimumWork { bits: u32 },

    /// The header's proof-of-work hash is above its target.
    #[error("hash does not match nBits {bits:#010x}")]
    HighHash { bits: u32 },

    /// Merged-mining rules rejected the header.
    #[error("merged mining check failed: {0}")]
    MergedMining(String),

    /// A genesis block did not reproduce its published constants.
    #[error("genesis {field} mismatch: expected {expected}, got {actual}")]
    GenesisMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// Chain or engine parameters are inconsistent.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Chain parameters could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for proof-of-work operations.
pub type PowResult<T> = Result<T, PowError>;
