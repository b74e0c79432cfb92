//! Fractional weight vectors and their basis-point counterparts.

use std::fmt;

use crate::error::{Error, Result};

/// Basis points in a fully allocated fund (100%).
pub const TOTAL_BPS: u32 = 10_000;

/// Fractional target allocation, positionally aligned to the fund's asset list.
///
/// Entries are expected in `0.0..=1.0` and to sum to roughly 1.0, but the
/// vector itself enforces nothing: it is raw signal output. Validation
/// happens when it is normalized into a [`BasisPointVector`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    pub fn new(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    /// Equal-weight fallback for `n` assets.
    ///
    /// Weights are whole hundredths summing to exactly 1.00, with the
    /// leftover hundredths going to the lowest indices, so three assets get
    /// `[0.34, 0.33, 0.33]`. Above 100 assets the unit is one basis point.
    ///
    /// ```
    /// use whackrock::WeightVector;
    ///
    /// let w = WeightVector::equal(3).unwrap();
    /// assert_eq!(w.as_slice(), &[0.34, 0.33, 0.33]);
    /// ```
    pub fn equal(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidInput(
                "equal weights need at least one asset".into(),
            ));
        }
        if n > TOTAL_BPS as usize {
            return Err(Error::InvalidInput(format!(
                "{n} assets cannot be split into basis points"
            )));
        }

        let unit: u32 = if n <= 100 { 100 } else { TOTAL_BPS };
        let base = unit / n as u32;
        let extra = (unit - base * n as u32) as usize;

        let weights = (0..n)
            .map(|i| {
                let units = base + u32::from(i < extra);
                f64::from(units) / f64::from(unit)
            })
            .collect();
        Ok(Self(weights))
    }

    /// Fractional reconstruction of a basis-point vector (`bps / 10000`).
    pub fn from_basis_points(bps: &BasisPointVector) -> Self {
        Self(
            bps.iter()
                .map(|&b| f64::from(b) / f64::from(TOTAL_BPS))
                .collect(),
        )
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for WeightVector {
    fn from(weights: Vec<f64>) -> Self {
        Self(weights)
    }
}

/// Allocation in basis points whose entries sum to exactly [`TOTAL_BPS`].
///
/// This is the shape submitted to the fund contract. Construction through
/// [`BasisPointVector::new`] (and deserialization) rejects anything else.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<u32>", into = "Vec<u32>")
)]
pub struct BasisPointVector(Vec<u32>);

impl BasisPointVector {
    /// Validate and wrap a basis-point vector.
    pub fn new(bps: Vec<u32>) -> Result<Self> {
        if bps.is_empty() {
            return Err(Error::InvalidBasisPoints("vector is empty".into()));
        }
        if let Some((i, &b)) = bps.iter().enumerate().find(|(_, b)| **b > TOTAL_BPS) {
            return Err(Error::InvalidBasisPoints(format!(
                "entry {i} is {b} (> {TOTAL_BPS})"
            )));
        }
        let sum: u64 = bps.iter().map(|&b| u64::from(b)).sum();
        if sum != u64::from(TOTAL_BPS) {
            return Err(Error::InvalidBasisPoints(format!(
                "sum is {sum}, expected {TOTAL_BPS}"
            )));
        }
        Ok(Self(bps))
    }

    /// Caller guarantees the sum invariant.
    pub(crate) fn from_apportioned(bps: Vec<u32>) -> Self {
        debug_assert_eq!(
            bps.iter().map(|&b| u64::from(b)).sum::<u64>(),
            u64::from(TOTAL_BPS)
        );
        Self(bps)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u32> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<u32> {
        self.0
    }
}

impl AsRef<[u32]> for BasisPointVector {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl TryFrom<Vec<u32>> for BasisPointVector {
    type Error = Error;

    fn try_from(bps: Vec<u32>) -> Result<Self> {
        Self::new(bps)
    }
}

impl From<BasisPointVector> for Vec<u32> {
    fn from(bps: BasisPointVector) -> Self {
        bps.0
    }
}

impl fmt::Display for BasisPointVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, &b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", format_bps(b))?;
        }
        write!(f, "]")
    }
}

/// Render basis points as a percentage, e.g. `1234` -> `"12.34%"`.
pub fn format_bps(bps: u32) -> String {
    format!("{}.{:02}%", bps / 100, bps % 100)
}
