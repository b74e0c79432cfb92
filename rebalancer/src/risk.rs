//! Pre-submit checks.
//!
//! Validates a normalized weight vector against the fund and configured
//! limits before it is submitted.

use rustc_hash::FxHashSet;
use serde::Serialize;
use whackrock::{BasisPointVector, NormalizationAnomaly, TOTAL_BPS, format_bps};

use crate::config::Config;

/// Result of running all pre-submit checks.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub checks: Vec<RiskCheck>,
}

/// A single check result.
#[derive(Debug, Clone, Serialize)]
pub struct RiskCheck {
    pub name: &'static str,
    pub status: RiskStatus,
    pub detail: String,
}

/// Whether a check passed, warned, or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Pass => write!(f, "PASS"),
            RiskStatus::Warn => write!(f, "WARN"),
            RiskStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl RiskReport {
    /// True if any check failed (not just warned).
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == RiskStatus::Fail)
    }

    /// True if any check warned.
    pub fn has_warnings(&self) -> bool {
        self.checks.iter().any(|c| c.status == RiskStatus::Warn)
    }

    /// Names of the failed checks.
    pub fn failures(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| c.status == RiskStatus::Fail)
            .map(|c| c.name)
            .collect()
    }
}

impl std::fmt::Display for RiskReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PRE-SUBMIT CHECKS:")?;
        for check in &self.checks {
            writeln!(f, "  [{}] {}: {}", check.status, check.name, check.detail)?;
        }
        Ok(())
    }
}

fn pass_or_fail(ok: bool) -> RiskStatus {
    if ok { RiskStatus::Pass } else { RiskStatus::Fail }
}

/// Run all pre-submit checks.
///
/// # Arguments
/// - `weights`: The normalized target about to be submitted
/// - `fund_symbols`: Asset symbols as the fund reports them, in fund order
/// - `anomalies`: What the normalizer flagged while producing `weights`
/// - `config`: Agent configuration (asset order, weight limit)
pub fn check_submission(
    weights: &BasisPointVector,
    fund_symbols: &[&str],
    anomalies: &[NormalizationAnomaly],
    config: &Config,
) -> RiskReport {
    let mut checks = Vec::new();
    let configured = &config.fund.assets;

    // 1. Asset order: the fund's assets line up with the configured list
    let order_ok = fund_symbols.len() == configured.len()
        && fund_symbols
            .iter()
            .zip(configured)
            .all(|(f, c)| f.eq_ignore_ascii_case(c));
    checks.push(RiskCheck {
        name: "Asset order",
        status: pass_or_fail(order_ok),
        detail: if order_ok {
            format!("{} assets match config", configured.len())
        } else {
            format!("fund [{}] vs config [{}]", fund_symbols.join(", "), configured.join(", "))
        },
    });

    // 2. Duplicate assets reported by the fund
    let mut seen = FxHashSet::default();
    let duplicates: Vec<&str> = fund_symbols
        .iter()
        .filter(|s| !seen.insert(s.to_ascii_lowercase()))
        .copied()
        .collect();
    if !duplicates.is_empty() {
        checks.push(RiskCheck {
            name: "Duplicate assets",
            status: RiskStatus::Fail,
            detail: duplicates.join(", "),
        });
    }

    // 3. Weight count matches the fund
    let count_ok = weights.len() == fund_symbols.len();
    checks.push(RiskCheck {
        name: "Weight count",
        status: pass_or_fail(count_ok),
        detail: format!("{} weights for {} assets", weights.len(), fund_symbols.len()),
    });

    // 4. Sum is exactly 10000 bps
    let sum: u64 = weights.iter().map(|&b| u64::from(b)).sum();
    let sum_ok = sum == u64::from(TOTAL_BPS);
    checks.push(RiskCheck {
        name: "Weight sum",
        status: pass_or_fail(sum_ok),
        detail: format!("{sum} bps {} {TOTAL_BPS}", if sum_ok { "==" } else { "!=" }),
    });

    // 5. No single weight above the configured cap
    let limit = config.rebalance.max_weight_bps;
    let (worst_idx, worst) = weights
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0), |best, (i, b)| if b > best.1 { (i, b) } else { best });
    let max_ok = worst <= limit;
    let worst_sym = configured.get(worst_idx).map_or("?", String::as_str);
    checks.push(RiskCheck {
        name: "Max weight",
        status: pass_or_fail(max_ok),
        detail: format!(
            "{} ({worst_sym}) {} {} limit",
            format_bps(worst),
            if max_ok { "<=" } else { ">" },
            format_bps(limit),
        ),
    });

    // 6. Normalization anomalies are surfaced, not fatal
    if anomalies.is_empty() {
        checks.push(RiskCheck {
            name: "Normalization",
            status: RiskStatus::Pass,
            detail: "clean".into(),
        });
    } else {
        for anomaly in anomalies {
            checks.push(RiskCheck {
                name: "Normalization",
                status: RiskStatus::Warn,
                detail: anomaly.to_string(),
            });
        }
    }

    RiskReport { checks }
}
