//! Error types for the rebalancer.

use std::path::PathBuf;

use crate::fund::FundError;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("signal error: {0}")]
    Signal(String),

    #[error("failed to read signal file {path}: {source}")]
    SignalRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signal store error: {0}")]
    Store(String),

    #[error("fund error: {0}")]
    Fund(#[from] FundError),

    #[error(transparent)]
    Weights(#[from] whackrock::Error),

    #[error("fund holds {fund} assets but {configured} are configured")]
    AssetMismatch { fund: usize, configured: usize },

    #[error("risk check failed: {0}")]
    RiskFailed(String),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
