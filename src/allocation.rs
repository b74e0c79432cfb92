//! Value-level helpers: live composition from holdings, splitting an amount
//! by target weights, and the per-asset transfers a rebalance implies.
//!
//! Monetary values are `i64` in the smallest currency unit (USD cents).

use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::weights::{BasisPointVector, TOTAL_BPS, WeightVector};

/// Signed per-asset drift, `current[i] - target[i]`.
pub fn deviations(current: &[u32], target: &[u32]) -> Result<Vec<i64>> {
    if current.len() != target.len() {
        return Err(Error::LengthMismatch {
            current: current.len(),
            target: target.len(),
        });
    }
    Ok(current
        .iter()
        .zip(target)
        .map(|(&c, &t)| i64::from(c) - i64::from(t))
        .collect())
}

/// Live composition in basis points from per-asset holdings.
///
/// An empty fund (zero total value) reports all zeros, which is not a
/// valid [`BasisPointVector`] and is therefore returned as a plain vector.
pub fn composition_from_values(values_cents: &[i64]) -> Result<Vec<u32>> {
    if values_cents.is_empty() {
        return Err(Error::InvalidInput("no asset values".into()));
    }

    let total = total_value(values_cents)?;
    if total == 0 {
        return Ok(vec![0; values_cents.len()]);
    }

    let shares = values_cents
        .iter()
        .map(|&v| v as f64 / total as f64)
        .collect();
    Ok(normalize(&WeightVector::new(shares))?.bps.into_inner())
}

/// Sum of non-negative holdings. Fails on a negative entry or a total
/// beyond `i64`.
fn total_value(values_cents: &[i64]) -> Result<i64> {
    values_cents
        .iter()
        .enumerate()
        .try_fold(0i64, |acc, (i, &v)| {
            if v < 0 {
                return Err(Error::InvalidInput(format!(
                    "asset {i} has negative value ({v})"
                )));
            }
            acc.checked_add(v)
                .ok_or_else(|| Error::InvalidInput("total asset value overflows".into()))
        })
}

/// Split `total_cents` by `target`, exactly.
///
/// Integer largest remainder: every share is floored, then the leftover
/// cents go to the largest remainders (lowest index on ties). The result
/// always sums to `total_cents`.
pub fn allocate(total_cents: i64, target: &BasisPointVector) -> Vec<i64> {
    let total = i128::from(total_cents);
    let denom = i128::from(TOTAL_BPS);

    let mut shares: Vec<i128> = Vec::with_capacity(target.len());
    let mut remainders: Vec<i128> = Vec::with_capacity(target.len());
    for &bps in target.iter() {
        let scaled = total * i128::from(bps);
        shares.push(scaled.div_euclid(denom));
        remainders.push(scaled.rem_euclid(denom));
    }

    let leftover = total - shares.iter().sum::<i128>();
    if leftover > 0 {
        let mut ranked: Vec<usize> = (0..shares.len()).collect();
        ranked.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));
        for &idx in ranked.iter().take(leftover as usize) {
            shares[idx] += 1;
        }
    }

    shares.into_iter().map(|s| s as i64).collect()
}

/// Direction of a value transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferSide {
    Sell,
    Buy,
}

/// One asset's move toward its target.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferLeg {
    pub index: usize,
    pub side: TransferSide,
    pub amount_cents: i64,
    pub current_bps: u32,
    pub target_bps: u32,
    pub deviation_bps: u32,
}

/// Transfers implied by a rebalance, largest deviation first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferPlan {
    pub sells: Vec<TransferLeg>,
    pub buys: Vec<TransferLeg>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.sells.is_empty() && self.buys.is_empty()
    }

    /// Total value moved out of over-weight assets.
    pub fn sell_total_cents(&self) -> i64 {
        self.sells.iter().map(|l| l.amount_cents).sum()
    }
}

/// Compute sells and buys to bring `values_cents` to `target`.
///
/// Only assets whose weight drifts strictly more than `threshold_bps` get
/// a leg. Current weights are floored to whole basis points. Negative
/// holdings, or a total beyond `i64`, are [`Error::InvalidInput`].
pub fn plan_transfers(
    values_cents: &[i64],
    target: &BasisPointVector,
    threshold_bps: u32,
) -> Result<TransferPlan> {
    if values_cents.len() != target.len() {
        return Err(Error::LengthMismatch {
            current: values_cents.len(),
            target: target.len(),
        });
    }

    let total = total_value(values_cents)?;
    let target_values = allocate(total, target);
    let mut plan = TransferPlan::default();

    for (index, (&current, &wanted)) in values_cents.iter().zip(&target_values).enumerate() {
        if current == 0 && wanted == 0 {
            continue;
        }

        let current_bps = if total > 0 {
            (i128::from(current) * i128::from(TOTAL_BPS) / i128::from(total)) as u32
        } else {
            0
        };
        let target_bps = target.as_slice()[index];
        let deviation_bps = current_bps.abs_diff(target_bps);
        if deviation_bps <= threshold_bps {
            continue;
        }

        let diff = current - wanted;
        let leg = |side| TransferLeg {
            index,
            side,
            amount_cents: diff.abs(),
            current_bps,
            target_bps,
            deviation_bps,
        };
        match diff {
            d if d > 0 => plan.sells.push(leg(TransferSide::Sell)),
            d if d < 0 => plan.buys.push(leg(TransferSide::Buy)),
            _ => {}
        }
    }

    plan.sells.sort_by(|a, b| b.deviation_bps.cmp(&a.deviation_bps));
    plan.buys.sort_by(|a, b| b.deviation_bps.cmp(&a.deviation_bps));
    Ok(plan)
}
