//! Errors for weight normalization and rebalance decisions.

/// Errors returned by the core operations.
///
/// Normalization anomalies are not errors; see
/// [`NormalizationAnomaly`](crate::NormalizationAnomaly).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Empty vector, NaN/infinite entry, or an unusable parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Current and target vectors cover a different number of assets.
    #[error("length mismatch: current has {current} assets, target has {target}")]
    LengthMismatch { current: usize, target: usize },

    /// A basis-point vector that does not sum to exactly 10000.
    #[error("invalid basis points: {0}")]
    InvalidBasisPoints(String),
}

pub type Result<T> = std::result::Result<T, Error>;
