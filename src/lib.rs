//! # whackrock
//!
//! Target-weight normalization and rebalance decisions for a weighted fund.
//!
//! A signal source produces fractional target weights for a fixed, ordered
//! list of fund assets. This crate turns them into the integer basis-point
//! vector a fund contract accepts, and decides whether the fund should be
//! rebalanced toward it.
//!
//! ## Features
//!
//! - **Exact basis points**: largest-remainder apportionment, the output
//!   always sums to 10000
//! - **Deterministic ties**: leftover units go to the lowest index first
//! - **Surfaced anomalies**: clamped negatives, off-sum inputs and bad
//!   remainders are reported, never silently absorbed
//! - **Two rebalance triggers**: drift past a threshold, or a changed target
//! - **Pure**: no I/O, no shared state, safe to call from anywhere
//!
//! ## Quick Start
//!
//! ```
//! use whackrock::{RebalanceDecider, WeightNormalizer, WeightVector};
//!
//! // Fractional weights from the signal source
//! let weights = WeightVector::new(vec![0.5, 0.3, 0.2]);
//! let target = WeightNormalizer::new().normalize(&weights).unwrap().bps;
//! assert_eq!(target.as_slice(), &[5000, 3000, 2000]);
//!
//! // Live composition and the target the fund currently stores
//! let current: [u32; 3] = [5400, 2700, 1900];
//! let stored: [u32; 3] = [5000, 3000, 2000];
//!
//! let report = RebalanceDecider::new(200)
//!     .decide(&current, target.as_slice(), Some(&stored))
//!     .unwrap();
//! assert_eq!(report.max_deviation_bps, 400);
//! assert!(report.needs_rebalance_by_deviation);
//! assert!(!report.targets_changed);
//! assert!(report.needs_rebalance);
//! ```
//!
//! ## Anomalies
//!
//! Malformed signals are tolerated but flagged:
//!
//! ```
//! use whackrock::{NormalizationAnomaly, WeightVector, normalize};
//!
//! let out = normalize(&WeightVector::new(vec![-0.1, 0.6, 0.5])).unwrap();
//! assert_eq!(out.bps.iter().sum::<u32>(), 10_000);
//! assert!(matches!(
//!     out.anomalies[0],
//!     NormalizationAnomaly::NegativeWeightClamped { index: 0, .. }
//! ));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | `Serialize`/`Deserialize` for all public types |

pub mod allocation;
pub mod decide;
pub mod error;
pub mod normalize;
pub mod weights;

pub use allocation::{
    TransferLeg, TransferPlan, TransferSide, allocate, composition_from_values, deviations,
    plan_transfers,
};
pub use decide::{DEFAULT_THRESHOLD_BPS, RebalanceDecider, RebalanceReport, decide};
pub use error::{Error, Result};
pub use normalize::{
    DEFAULT_TOLERANCE, NormalizationAnomaly, Normalized, WeightNormalizer, normalize,
};
pub use weights::{BasisPointVector, TOTAL_BPS, WeightVector, format_bps};
