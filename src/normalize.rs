//! Fractional weights to basis points (largest-remainder apportionment).
//!
//! Each clamped weight is scaled to basis points and floored; the units
//! lost to flooring go one at a time to the assets with the largest
//! fractional parts, lowest index first on ties. The result sums to
//! exactly [`TOTAL_BPS`].
//!
//! Inputs that cannot be apportioned directly (sum outside tolerance, a
//! negative remainder, more leftover units than assets, nothing positive
//! at all) are rescaled and apportioned again. Every such correction is
//! reported as a [`NormalizationAnomaly`] so the caller can log or alert.

use std::fmt;

use crate::error::{Error, Result};
use crate::weights::{BasisPointVector, TOTAL_BPS, WeightVector};

/// Allowed distance between the weight sum and 1.0.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// A correction applied while normalizing. Warnings, not failures.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NormalizationAnomaly {
    /// A negative weight was treated as zero.
    NegativeWeightClamped { index: usize, value: f64 },
    /// Clamped weights summed this far from 1.0; proportions were kept.
    SumOutOfTolerance { sum: f64 },
    /// Floored basis points overshot the total by `-remainder`.
    NegativeRemainder { remainder: i64 },
    /// More leftover units than assets to hand them to.
    RemainderExceedsAssets { remainder: i64 },
    /// Nothing positive to allocate; split equally.
    ZeroTotal,
}

impl fmt::Display for NormalizationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationAnomaly::NegativeWeightClamped { index, value } => {
                write!(f, "weight {index} was negative ({value}), clamped to 0")
            }
            NormalizationAnomaly::SumOutOfTolerance { sum } => {
                write!(f, "weights sum to {sum:.6}, rescaled to 1.0")
            }
            NormalizationAnomaly::NegativeRemainder { remainder } => {
                write!(f, "negative remainder ({remainder}) after flooring, rescaled")
            }
            NormalizationAnomaly::RemainderExceedsAssets { remainder } => {
                write!(f, "remainder ({remainder}) exceeds asset count, rescaled")
            }
            NormalizationAnomaly::ZeroTotal => {
                write!(f, "no positive weight, split equally")
            }
        }
    }
}

/// Output of [`WeightNormalizer::normalize`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Normalized {
    pub bps: BasisPointVector,
    pub anomalies: Vec<NormalizationAnomaly>,
}

impl Normalized {
    /// True if the input needed no correction.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn into_bps(self) -> BasisPointVector {
        self.bps
    }
}

/// Converts [`WeightVector`]s into [`BasisPointVector`]s.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightNormalizer {
    tolerance: f64,
}

impl Default for WeightNormalizer {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl WeightNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer accepting sums within `tolerance` of 1.0 as-is.
    pub fn with_tolerance(tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidInput(format!(
                "tolerance must be finite and >= 0, got {tolerance}"
            )));
        }
        Ok(Self { tolerance })
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Normalize `weights` into basis points summing to exactly 10000.
    ///
    /// Fails with [`Error::InvalidInput`] on an empty vector or any
    /// NaN/infinite entry. Everything else yields a vector, with the
    /// corrections listed in [`Normalized::anomalies`].
    ///
    /// ```
    /// use whackrock::{WeightNormalizer, WeightVector};
    ///
    /// let out = WeightNormalizer::new()
    ///     .normalize(&WeightVector::new(vec![1.0 / 3.0; 3]))
    ///     .unwrap();
    /// assert_eq!(out.bps.as_slice(), &[3334, 3333, 3333]);
    /// assert!(out.is_clean());
    /// ```
    pub fn normalize(&self, weights: &WeightVector) -> Result<Normalized> {
        let raw = weights.as_slice();
        if raw.is_empty() {
            return Err(Error::InvalidInput("weight vector is empty".into()));
        }
        if let Some((i, w)) = raw.iter().enumerate().find(|(_, w)| !w.is_finite()) {
            return Err(Error::InvalidInput(format!("weight {i} is not finite ({w})")));
        }

        let n = raw.len();
        let mut anomalies = Vec::new();

        let mut clamped: Vec<f64> = raw
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                if value < 0.0 {
                    anomalies.push(NormalizationAnomaly::NegativeWeightClamped { index, value });
                    0.0
                } else {
                    value
                }
            })
            .collect();

        let sum: f64 = clamped.iter().sum();
        if sum <= 0.0 {
            anomalies.push(NormalizationAnomaly::ZeroTotal);
            clamped = vec![1.0 / n as f64; n];
        } else if (sum - 1.0).abs() > self.tolerance {
            anomalies.push(NormalizationAnomaly::SumOutOfTolerance { sum });
            rescale_to_unit(&mut clamped);
        }

        let (mut bps, remainder) = apportion(&clamped);
        if remainder < 0 || remainder > n as i64 {
            anomalies.push(if remainder < 0 {
                NormalizationAnomaly::NegativeRemainder { remainder }
            } else {
                NormalizationAnomaly::RemainderExceedsAssets { remainder }
            });
            rescale_to_unit(&mut clamped);
            let (rescaled, remainder) = apportion(&clamped);
            if remainder < 0 || remainder > n as i64 {
                return Err(Error::InvalidInput(format!(
                    "weights could not be apportioned (remainder {remainder})"
                )));
            }
            bps = rescaled;
        }

        Ok(Normalized {
            bps: BasisPointVector::from_apportioned(bps),
            anomalies,
        })
    }
}

/// Normalize with the default tolerance.
pub fn normalize(weights: &WeightVector) -> Result<Normalized> {
    WeightNormalizer::default().normalize(weights)
}

/// Divide by the sum. Large finite weights can overflow the sum, so they
/// are first brought down by the largest one.
fn rescale_to_unit(weights: &mut [f64]) {
    let mut sum: f64 = weights.iter().sum();
    if !sum.is_finite() {
        let max = weights.iter().copied().fold(0.0, f64::max);
        for w in weights.iter_mut() {
            *w /= max;
        }
        sum = weights.iter().sum();
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }
}

/// Floor each share and hand out the leftover units by largest fractional
/// part, at most one per asset.
///
/// Returns the allocation and the remainder observed after flooring. A
/// negative remainder leaves the floors untouched; one larger than the
/// asset count is only partially distributed.
fn apportion(weights: &[f64]) -> (Vec<u32>, i64) {
    let exact: Vec<f64> = weights.iter().map(|w| w * f64::from(TOTAL_BPS)).collect();
    let mut floors: Vec<u32> = exact.iter().map(|e| e.floor() as u32).collect();

    let floor_sum: i64 = floors.iter().map(|&b| i64::from(b)).sum();
    let remainder = i64::from(TOTAL_BPS) - floor_sum;

    if remainder > 0 {
        let mut ranked: Vec<usize> = (0..floors.len()).collect();
        ranked.sort_by(|&a, &b| {
            let frac_a = exact[a] - f64::from(floors[a]);
            let frac_b = exact[b] - f64::from(floors[b]);
            frac_b.total_cmp(&frac_a).then(a.cmp(&b))
        });
        for &idx in ranked.iter().take(remainder as usize) {
            floors[idx] += 1;
        }
    }

    (floors, remainder)
}
