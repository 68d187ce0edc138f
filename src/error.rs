//! Error types for cu-settlement.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tracker, the stores and the settlement engine.
///
/// Per-provider failures during settlement are never surfaced through this
/// type; they are logged and the loop moves on. Only the failures that abort
/// a settlement before any state is touched end up here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Versioned store error.
    #[error("store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("codec error: {0}")]
    Codec(String),

    /// The timer payload that triggers a settlement could not be decoded.
    #[error("invalid settlement trigger: {0}")]
    InvalidTrigger(String),

    /// A provider address is not a valid account address.
    #[error("invalid provider address: {0}")]
    InvalidAddress(String),

    /// The max reward boost parameter is zero, so no default adjustment
    /// factor can be derived.
    #[error("max reward boost is zero: cannot derive default adjustment factor")]
    ZeroMaxRewardBoost,
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
