//! Archiver discovery error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No archiver candidates found in any source")]
    NoCandidates,

    #[error("No archivers responded with a verified active list")]
    NoResponse,

    #[error("Archiver roster is not initialized, run setup first")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid seed list: {0}")]
    InvalidSeedList(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason a candidate endpoint was excluded from the roster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Archiver ip is not defined")]
    MissingIp,

    #[error("Archiver ip is invalid: {0}")]
    InvalidIp(String),

    #[error("Archiver port is not defined")]
    MissingPort,

    #[error("Archiver port is invalid: {0}")]
    InvalidPort(i64),

    #[error("Archiver publicKey is not defined")]
    MissingPublicKey,
}
