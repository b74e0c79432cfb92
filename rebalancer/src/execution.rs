//! Cycle orchestrator: signal → normalize → decide → check → submit.
//!
//! This is the main workflow that ties together all components.

use log::{error, info, warn};
use whackrock::{
    RebalanceDecider, RebalanceReport, TransferSide, WeightNormalizer, WeightVector, format_bps,
    plan_transfers,
};

use crate::announce::compose_announcement;
use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fund::{Composition, FundGateway, SnapshotFund, Submission};
use crate::risk;
use crate::signal::{FileSignal, SignalSource, derive_weights};
use crate::store::{JsonFileStore, SignalStore};

/// Options for a rebalance run.
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
    pub signal_file: String,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The fund holds no assets; nothing to do.
    Skipped,
    NoRebalanceNeeded(RebalanceReport),
    /// Dry run: everything up to submission, nothing sent.
    DryRun(RebalanceReport),
    /// The operator declined at the prompt.
    Declined(RebalanceReport),
    Submitted {
        report: RebalanceReport,
        submission: Submission,
        announcement: Option<String>,
    },
}

/// Whether a report calls for a rebalance under this configuration.
pub fn rebalance_required(report: &RebalanceReport, config: &Config) -> bool {
    if config.rebalance.trigger_on_target_change {
        report.needs_rebalance
    } else {
        report.needs_rebalance_by_deviation
    }
}

/// Execute a full rebalance run against the file-backed fund and store.
pub fn run(config: &Config, opts: &RunOptions) -> Result<CycleOutcome> {
    let fund = SnapshotFund::from_config(&config.fund);
    let source = FileSignal::new(&opts.signal_file);
    let mut store = JsonFileStore::new(&config.signal.store);
    let mut audit = AuditLog::open(&config.audit_path())?;

    let outcome = run_cycle(config, &fund, &source, &mut store, &mut audit, opts)?;
    println!("Audit logged to {}", config.audit_path().display());
    Ok(outcome)
}

/// One cycle against any fund gateway, signal source and store.
///
/// Any collaborator failure ends the cycle before anything is submitted.
pub fn run_cycle(
    config: &Config,
    fund: &dyn FundGateway,
    source: &dyn SignalSource,
    store: &mut dyn SignalStore,
    audit: &mut AuditLog,
    opts: &RunOptions,
) -> Result<CycleOutcome> {
    audit::log_run_started(audit, &opts.signal_file, &config.fund.address)?;

    // 1. Live composition
    let composition = fund.current_composition()?;
    audit::log_composition(audit, &composition)?;

    if composition.is_empty() {
        warn!("Fund {} holds no assets; skipping cycle", config.fund.address);
        audit::log_run_completed(audit, "skipped")?;
        return Ok(CycleOutcome::Skipped);
    }
    if composition.len() != config.asset_count() {
        error!(
            "Fund reports {} assets, config lists {}",
            composition.len(),
            config.asset_count()
        );
        return Err(Error::AssetMismatch {
            fund: composition.len(),
            configured: config.asset_count(),
        });
    }
    display_composition(&composition);

    // 2. Target weights from the signal (or a fallback)
    let derived = derive_weights(source, store, config.asset_count());
    info!("Weights from {}", derived.origin);

    let normalizer = WeightNormalizer::with_tolerance(config.signal.tolerance)?;
    let normalized = normalizer.normalize(&derived.weights)?;
    for anomaly in &normalized.anomalies {
        warn!("Normalization: {anomaly}");
    }
    audit::log_weights_derived(audit, &derived, &normalized)?;

    // 3. Decide against the live composition and the stored target
    let current = composition.current_bps();
    let stored = fund.target_composition()?;
    let previous = (!stored.is_empty()).then_some(stored.as_slice());

    let decider = RebalanceDecider::new(config.rebalance.threshold_bps);
    let report = decider.decide(&current, normalized.bps.as_slice(), previous)?;
    let rebalance = rebalance_required(&report, config);

    println!();
    display_targets(&config.fund.assets, &current, normalized.bps.as_slice());
    print!("\n{report}");
    audit::log_decision(audit, &report, rebalance)?;

    if !rebalance {
        println!("\nNo rebalancing needed: fund is within threshold of target.");
        audit.log_simple("no_rebalance_needed")?;
        audit::log_run_completed(audit, "no_rebalance_needed")?;
        return Ok(CycleOutcome::NoRebalanceNeeded(report));
    }

    if let Some(values) = composition.values_cents() {
        display_transfers(&config.fund.assets, &values, &normalized.bps, config);
    }

    // 4. Pre-submit checks
    let risk_report = risk::check_submission(
        &normalized.bps,
        &composition.symbols(),
        &normalized.anomalies,
        config,
    );
    print!("\n{risk_report}");
    audit::log_risk_check(audit, &risk_report)?;

    if risk_report.has_failures() {
        return Err(Error::RiskFailed(format!(
            "{} check(s) failed, aborting",
            risk_report.failures().join(", ")
        )));
    }

    // 5. Dry run stops here
    if opts.dry_run {
        println!("\n[DRY RUN] No weights submitted.");
        audit::log_run_completed(audit, "dry_run")?;
        return Ok(CycleOutcome::DryRun(report));
    }

    // 6. Confirm
    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Submit new weights?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        audit.log("user_confirmed", serde_json::json!({"approved": confirmed}))?;
        if !confirmed {
            println!("Aborted.");
            audit::log_run_completed(audit, "declined")?;
            return Ok(CycleOutcome::Declined(report));
        }
    }

    // 7. Submit
    let submission = fund.set_weights_and_rebalance(&normalized.bps)?;
    info!(
        "Submitted {} to {} (request {})",
        submission.weights, submission.fund, submission.request_id
    );
    audit::log_weights_submitted(audit, &submission)?;
    println!("\nSubmitted: request {}", submission.request_id);

    // 8. Announcement
    let announcement = config.announce.enabled.then(|| {
        compose_announcement(
            &config.fund.assets,
            &current,
            normalized.bps.as_slice(),
            derived.signal.as_ref(),
            report.max_deviation_bps,
            &config.announce.hashtags,
        )
    });
    if let Some(text) = &announcement {
        println!("\nANNOUNCEMENT:\n{text}");
    }

    audit::log_run_completed(audit, "submitted")?;
    Ok(CycleOutcome::Submitted {
        report,
        submission,
        announcement,
    })
}

/// Show the fund's live composition against its stored target.
pub fn show_composition(config: &Config) -> Result<()> {
    let fund = SnapshotFund::from_config(&config.fund);
    let composition = fund.current_composition()?;
    let target = fund.target_composition()?;

    println!("Fund {}\n", config.fund.address);
    if composition.is_empty() {
        println!("No assets.");
        return Ok(());
    }

    display_targets(&composition.symbols(), &composition.current_bps(), &target);
    if !target.is_empty() {
        let report = RebalanceDecider::new(config.rebalance.threshold_bps).decide(
            &composition.current_bps(),
            &target,
            None,
        )?;
        print!("\n{report}");
    }
    Ok(())
}

/// List processed signals, oldest first.
pub fn show_history(config: &Config) -> Result<()> {
    let store = JsonFileStore::new(&config.signal.store);
    let records = store.records()?;
    if records.is_empty() {
        println!("No processed signals in {}.", store.path().display());
        return Ok(());
    }

    println!("PROCESSED SIGNALS:");
    for r in &records {
        let weights: Vec<String> = r
            .document
            .weight_signal
            .iter()
            .map(|w| format!("{:.2}%", w * 100.0))
            .collect();
        println!(
            "  {}  {:12}  {:8} {:3}  [{}]  {}",
            r.processed_at.format("%Y-%m-%d %H:%M"),
            r.document.signal_id,
            r.document.macro_tone,
            r.document.risk_on_off,
            weights.join(", "),
            r.document.title,
        );
    }
    Ok(())
}

/// Normalize raw weights and print the result.
pub fn show_normalized(weights: Vec<f64>, tolerance: f64) -> Result<()> {
    let normalizer = WeightNormalizer::with_tolerance(tolerance)?;
    let normalized = normalizer.normalize(&WeightVector::new(weights))?;
    println!("{}", normalized.bps);
    println!(
        "bps: {}",
        normalized
            .bps
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
    for anomaly in &normalized.anomalies {
        println!("  [WARN] {anomaly}");
    }
    Ok(())
}

// === Helpers ===

fn display_composition(composition: &Composition) {
    println!("CURRENT COMPOSITION:");
    for asset in &composition.assets {
        match asset.value_cents {
            Some(v) => println!(
                "  {:8} {:>8}  ${:>12.2}",
                asset.symbol,
                format_bps(asset.current_bps),
                v as f64 / 100.0,
            ),
            None => println!("  {:8} {:>8}", asset.symbol, format_bps(asset.current_bps)),
        }
    }
}

fn display_targets<S: AsRef<str>>(symbols: &[S], current: &[u32], target: &[u32]) {
    println!("  {:8} {:>8} {:>8} {:>8}", "Asset", "Current", "Target", "Drift");
    for (i, symbol) in symbols.iter().enumerate() {
        let cur = current.get(i).copied();
        let tgt = target.get(i).copied();
        let drift = match (cur, tgt) {
            (Some(c), Some(t)) => format!("{:+}", i64::from(c) - i64::from(t)),
            _ => "-".into(),
        };
        println!(
            "  {:8} {:>8} {:>8} {:>8}",
            symbol.as_ref(),
            cur.map_or_else(|| "-".into(), format_bps),
            tgt.map_or_else(|| "-".into(), format_bps),
            drift,
        );
    }
}

fn display_transfers(
    symbols: &[String],
    values_cents: &[i64],
    target: &whackrock::BasisPointVector,
    config: &Config,
) {
    let plan = match plan_transfers(values_cents, target, config.rebalance.threshold_bps) {
        Ok(p) => p,
        Err(e) => {
            warn!("Cannot estimate transfers: {e}");
            return;
        }
    };
    if plan.is_empty() {
        return;
    }

    println!("\nESTIMATED TRANSFERS:");
    for leg in plan.sells.iter().chain(&plan.buys) {
        let action = match leg.side {
            TransferSide::Sell => "SELL",
            TransferSide::Buy => "BUY",
        };
        println!(
            "  {:4} {:8} ${:>12.2}  ({} -> {})",
            action,
            symbols.get(leg.index).map_or("?", String::as_str),
            leg.amount_cents as f64 / 100.0,
            format_bps(leg.current_bps),
            format_bps(leg.target_bps),
        );
    }
    println!("  Total moved: ${:.2}", plan.sell_total_cents() as f64 / 100.0);
}
