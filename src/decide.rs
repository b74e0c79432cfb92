//! Rebalance decision: drift past a threshold, or a changed target.

use std::fmt;

use crate::allocation::deviations;
use crate::error::{Error, Result};
use crate::weights::{TOTAL_BPS, format_bps};

/// Largest per-asset drift tolerated before a rebalance (2%).
pub const DEFAULT_THRESHOLD_BPS: u32 = 200;

/// Outcome of comparing a fund's current composition against a target.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceReport {
    /// Signed drift per asset, `current[i] - target[i]`.
    pub deviations: Vec<i64>,
    /// Largest absolute drift across all assets.
    pub max_deviation_bps: u32,
    /// Asset holding the largest drift (lowest index on ties).
    pub worst_index: usize,
    pub threshold_bps: u32,
    /// `max_deviation_bps > threshold_bps`.
    pub needs_rebalance_by_deviation: bool,
    /// The new target differs from the one the fund has stored.
    pub targets_changed: bool,
    /// Either trigger fired.
    pub needs_rebalance: bool,
}

impl RebalanceReport {
    /// Largest drift as a fraction (`0.03` for 300 bps).
    pub fn max_deviation_fraction(&self) -> f64 {
        f64::from(self.max_deviation_bps) / f64::from(TOTAL_BPS)
    }
}

impl fmt::Display for RebalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "REBALANCE DECISION:")?;
        writeln!(
            f,
            "  Max deviation: {} (asset #{}) {} {} threshold",
            format_bps(self.max_deviation_bps),
            self.worst_index,
            if self.needs_rebalance_by_deviation {
                ">"
            } else {
                "<="
            },
            format_bps(self.threshold_bps),
        )?;
        writeln!(
            f,
            "  Targets changed: {}",
            if self.targets_changed { "yes" } else { "no" }
        )?;
        writeln!(
            f,
            "  Verdict: {}",
            if self.needs_rebalance {
                "REBALANCE"
            } else {
                "HOLD"
            }
        )
    }
}

/// Compares current vs target compositions against a drift threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceDecider {
    threshold_bps: u32,
}

impl Default for RebalanceDecider {
    fn default() -> Self {
        Self {
            threshold_bps: DEFAULT_THRESHOLD_BPS,
        }
    }
}

impl RebalanceDecider {
    pub fn new(threshold_bps: u32) -> Self {
        Self { threshold_bps }
    }

    #[inline]
    pub fn threshold_bps(&self) -> u32 {
        self.threshold_bps
    }

    /// Decide whether the fund should be rebalanced.
    ///
    /// `current` is the live composition, `target` the newly derived
    /// target and `previous_target` the target the fund currently stores,
    /// if known. All are basis points in the same asset order.
    ///
    /// A rebalance is needed when any asset drifts strictly more than the
    /// threshold, or when `target` differs element-wise from
    /// `previous_target`. A `previous_target` of another length counts as
    /// changed; `current` and `target` of different lengths is an error.
    ///
    /// ```
    /// use whackrock::RebalanceDecider;
    ///
    /// let report = RebalanceDecider::new(200)
    ///     .decide(&[5000, 3000, 2000], &[5300, 2700, 2000], None)
    ///     .unwrap();
    /// assert_eq!(report.max_deviation_bps, 300);
    /// assert!(report.needs_rebalance);
    /// ```
    pub fn decide(
        &self,
        current: &[u32],
        target: &[u32],
        previous_target: Option<&[u32]>,
    ) -> Result<RebalanceReport> {
        if current.is_empty() && target.is_empty() {
            return Err(Error::InvalidInput("composition is empty".into()));
        }
        let deviations = deviations(current, target)?;

        let (worst_index, max_deviation_bps) = deviations
            .iter()
            .map(|d| d.unsigned_abs())
            .enumerate()
            .fold((0, 0u64), |(wi, wd), (i, d)| if d > wd { (i, d) } else { (wi, wd) });
        // Both sides are u32, so the gap fits.
        let max_deviation_bps = max_deviation_bps as u32;

        let needs_rebalance_by_deviation = max_deviation_bps > self.threshold_bps;
        let targets_changed = previous_target.is_some_and(|prev| prev != target);

        Ok(RebalanceReport {
            deviations,
            max_deviation_bps,
            worst_index,
            threshold_bps: self.threshold_bps,
            needs_rebalance_by_deviation,
            targets_changed,
            needs_rebalance: needs_rebalance_by_deviation || targets_changed,
        })
    }
}

/// Decide with an explicit threshold.
pub fn decide(
    current: &[u32],
    target: &[u32],
    previous_target: Option<&[u32]>,
    threshold_bps: u32,
) -> Result<RebalanceReport> {
    RebalanceDecider::new(threshold_bps).decide(current, target, previous_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_drift_same_target_holds() {
        let r = decide(
            &[5000, 3000, 2000],
            &[5100, 2950, 1950],
            Some(&[5100, 2950, 1950]),
            200,
        )
        .unwrap();
        assert_eq!(r.max_deviation_bps, 100);
        assert!(!r.needs_rebalance_by_deviation);
        assert!(!r.targets_changed);
        assert!(!r.needs_rebalance);
    }

    #[test]
    fn large_drift_new_target_rebalances() {
        let r = decide(
            &[5000, 3000, 2000],
            &[5300, 2700, 2000],
            Some(&[5000, 3000, 2000]),
            200,
        )
        .unwrap();
        assert_eq!(r.max_deviation_bps, 300);
        assert_eq!(r.worst_index, 0);
        assert_eq!(r.deviations, vec![-300, 300, 0]);
        assert!(r.needs_rebalance_by_deviation);
        assert!(r.targets_changed);
        assert!(r.needs_rebalance);
    }

    #[test]
    fn threshold_is_strict() {
        let r = decide(&[5000, 5000], &[5200, 4800], None, 200).unwrap();
        assert_eq!(r.max_deviation_bps, 200);
        assert!(!r.needs_rebalance_by_deviation);
        assert!(!r.needs_rebalance);
    }

    #[test]
    fn target_change_alone_triggers() {
        let r = decide(&[5000, 5000], &[5050, 4950], Some(&[5000, 5000]), 200).unwrap();
        assert!(!r.needs_rebalance_by_deviation);
        assert!(r.targets_changed);
        assert!(r.needs_rebalance);
    }

    #[test]
    fn previous_of_other_length_counts_as_changed() {
        let r = decide(&[5000, 5000], &[5000, 5000], Some(&[10_000]), 200).unwrap();
        assert!(r.targets_changed);
        assert!(r.needs_rebalance);
    }

    #[test]
    fn no_previous_means_unchanged() {
        let r = decide(&[5000, 5000], &[4000, 6000], None, 200).unwrap();
        assert!(!r.targets_changed);
        assert!(r.needs_rebalance);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = decide(&[5000, 5000], &[10_000], None, 200).unwrap_err();
        assert_eq!(
            err,
            Error::LengthMismatch {
                current: 2,
                target: 1
            }
        );
    }

    #[test]
    fn empty_is_an_error() {
        assert!(matches!(
            decide(&[], &[], None, 200),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn default_threshold() {
        assert_eq!(RebalanceDecider::default().threshold_bps(), 200);
    }

    #[test]
    fn display_table() {
        let r = decide(&[5000, 3000, 2000], &[5300, 2700, 2000], None, 200).unwrap();
        let s = format!("{r}");
        assert!(s.contains("3.00% (asset #0) > 2.00% threshold"));
        assert!(s.contains("Verdict: REBALANCE"));
    }

    #[test]
    fn fraction_helper() {
        let r = decide(&[5000, 5000], &[5300, 4700], None, 200).unwrap();
        assert!((r.max_deviation_fraction() - 0.03).abs() < 1e-12);
    }
}
