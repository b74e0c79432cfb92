//! Integration tests for full rebalance cycles.

use std::path::Path;

use whackrock_rebalancer::audit::AuditLog;
use whackrock_rebalancer::config::Config;
use whackrock_rebalancer::error::Error;
use whackrock_rebalancer::execution::{self, CycleOutcome, RunOptions, run_cycle};
use whackrock_rebalancer::fund::{FundError, FundGateway};
use whackrock_rebalancer::mock::{MockFund, MockFundBuilder, SubmitMode};
use whackrock_rebalancer::signal::{FixedSignal, SignalDocument};
use whackrock_rebalancer::store::{JsonFileStore, MemoryStore, SignalStore};

fn config_with(extra: &str) -> Config {
    let toml = format!(
        r#"
[fund]
address = "0xmock"
assets = ["VIRTUAL", "cbBTC", "USDC"]

{extra}
"#
    );
    Config::from_toml(&toml).unwrap()
}

fn config() -> Config {
    config_with("")
}

fn signal(id: &str, weights: &[f64]) -> SignalDocument {
    let json = format!(
        r#"{{
            "signalId": "{id}",
            "title": "Is the bottom in?",
            "publishedAt": "2026-06-01T12:00:00Z",
            "macroTone": "bullish",
            "riskOnOff": "on",
            "weightSignal": {weights:?},
            "analysisSummary": "Adding BTC exposure."
        }}"#
    );
    SignalDocument::from_json(&json).unwrap()
}

fn fund(current: [u32; 3]) -> MockFundBuilder {
    MockFund::builder()
        .with_asset("VIRTUAL", current[0])
        .with_asset("cbBTC", current[1])
        .with_asset("USDC", current[2])
}

fn forced() -> RunOptions {
    RunOptions {
        dry_run: false,
        force: true,
        signal_file: "signal.json".into(),
    }
}

fn audit_events(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect()
}

struct Harness {
    _dir: tempfile::TempDir,
    audit_path: std::path::PathBuf,
    audit: AuditLog,
    store: MemoryStore,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let audit = AuditLog::open(&audit_path).unwrap();
    Harness {
        _dir: dir,
        audit_path,
        audit,
        store: MemoryStore::default(),
    }
}

// ============================================================================
// Decision outcomes
// ============================================================================

#[test]
fn fresh_signal_past_threshold_is_submitted() {
    let mut h = harness();
    let fund = fund([5000, 2500, 2500]).with_target(vec![5000, 2500, 2500]).build();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));

    let outcome = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &forced()).unwrap();

    let (report, submission, announcement) = match outcome {
        CycleOutcome::Submitted {
            report,
            submission,
            announcement,
        } => (report, submission, announcement),
        other => panic!("expected Submitted, got {other:?}"),
    };
    assert_eq!(report.max_deviation_bps, 2500);
    assert!(report.targets_changed);
    assert_eq!(submission.weights.as_slice(), &[2500, 5000, 2500]);
    assert_eq!(fund.submissions().len(), 1);
    assert_eq!(fund.target_composition().unwrap(), vec![2500, 5000, 2500]);

    let text = announcement.unwrap();
    assert!(text.contains("Is the bottom in?"));
    assert!(text.contains("- $VIRTUAL: 50.00% -> 25.00%"));
    assert!(text.chars().count() <= 280);

    assert!(h.store.load("s1").unwrap().is_some());
    assert_eq!(
        audit_events(&h.audit_path),
        vec![
            "run_started",
            "composition_fetched",
            "weights_derived",
            "decision",
            "risk_check",
            "weights_submitted",
            "run_completed",
        ]
    );
}

#[test]
fn small_drift_same_target_holds() {
    let mut h = harness();
    let fund = fund([5100, 2450, 2450]).with_target(vec![5000, 2500, 2500]).build();
    let source = FixedSignal(Some(signal("s1", &[0.5, 0.25, 0.25])));

    let outcome = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &forced()).unwrap();

    let report = match outcome {
        CycleOutcome::NoRebalanceNeeded(report) => report,
        other => panic!("expected NoRebalanceNeeded, got {other:?}"),
    };
    assert_eq!(report.max_deviation_bps, 100);
    assert!(!report.targets_changed);
    assert!(fund.submissions().is_empty());
    assert!(audit_events(&h.audit_path).contains(&"no_rebalance_needed".to_string()));
}

#[test]
fn changed_target_alone_triggers_by_default() {
    let mut h = harness();
    let fund = fund([5100, 2450, 2450]).with_target(vec![5200, 2400, 2400]).build();
    let source = FixedSignal(Some(signal("s1", &[0.5, 0.25, 0.25])));

    let outcome = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &forced()).unwrap();

    assert!(matches!(outcome, CycleOutcome::Submitted { .. }));
    assert_eq!(fund.submissions()[0].as_slice(), &[5000, 2500, 2500]);
}

#[test]
fn changed_target_ignored_when_disabled() {
    let mut h = harness();
    let config = config_with("[rebalance]\ntrigger_on_target_change = false");
    let fund = fund([5100, 2450, 2450]).with_target(vec![5200, 2400, 2400]).build();
    let source = FixedSignal(Some(signal("s1", &[0.5, 0.25, 0.25])));

    let outcome = run_cycle(&config, &fund, &source, &mut h.store, &mut h.audit, &forced()).unwrap();

    let report = match outcome {
        CycleOutcome::NoRebalanceNeeded(report) => report,
        other => panic!("expected NoRebalanceNeeded, got {other:?}"),
    };
    assert!(report.targets_changed);
    assert!(!report.needs_rebalance_by_deviation);
    assert!(fund.submissions().is_empty());
}

#[test]
fn no_signal_uses_equal_weights() {
    let mut h = harness();
    let fund = fund([5000, 3000, 2000]).build();

    let outcome = run_cycle(
        &config(),
        &fund,
        &FixedSignal(None),
        &mut h.store,
        &mut h.audit,
        &forced(),
    )
    .unwrap();

    let (report, announcement) = match outcome {
        CycleOutcome::Submitted {
            report,
            announcement,
            ..
        } => (report, announcement),
        other => panic!("expected Submitted, got {other:?}"),
    };
    // No stored target: only drift can trigger
    assert!(!report.targets_changed);
    assert_eq!(report.max_deviation_bps, 1600);
    assert_eq!(fund.submissions()[0].as_slice(), &[3400, 3300, 3300]);
    assert!(announcement.unwrap().contains("deviation: 16.00%"));
}

#[test]
fn processed_signal_is_reused() {
    let mut h = harness();
    let config = config();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));

    let first = fund([5000, 2500, 2500]).build();
    run_cycle(&config, &first, &source, &mut h.store, &mut h.audit, &forced()).unwrap();

    // Same signal again: weights come from the store, fund already at target
    let second = fund([2500, 5000, 2500]).with_target(vec![2500, 5000, 2500]).build();
    let outcome = run_cycle(&config, &second, &source, &mut h.store, &mut h.audit, &forced()).unwrap();
    assert!(matches!(outcome, CycleOutcome::NoRebalanceNeeded(_)));
    assert_eq!(h.store.records().unwrap().len(), 1);
}

// ============================================================================
// Stops and failures
// ============================================================================

#[test]
fn dry_run_submits_nothing() {
    let mut h = harness();
    let fund = fund([5000, 2500, 2500]).build();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));
    let opts = RunOptions {
        dry_run: true,
        ..forced()
    };

    let outcome = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &opts).unwrap();

    assert!(matches!(outcome, CycleOutcome::DryRun(_)));
    assert!(fund.submissions().is_empty());
}

#[test]
fn empty_fund_is_skipped() {
    let mut h = harness();
    let fund = MockFund::builder().build();

    let outcome = run_cycle(
        &config(),
        &fund,
        &FixedSignal(None),
        &mut h.store,
        &mut h.audit,
        &forced(),
    )
    .unwrap();

    assert_eq!(outcome, CycleOutcome::Skipped);
    assert!(fund.submissions().is_empty());
}

#[test]
fn asset_count_mismatch_fails() {
    let mut h = harness();
    let fund = MockFund::builder()
        .with_asset("VIRTUAL", 5000)
        .with_asset("USDC", 5000)
        .build();

    let result = run_cycle(
        &config(),
        &fund,
        &FixedSignal(None),
        &mut h.store,
        &mut h.audit,
        &forced(),
    );

    assert!(matches!(
        result,
        Err(Error::AssetMismatch {
            fund: 2,
            configured: 3
        })
    ));
    assert!(fund.submissions().is_empty());
}

#[test]
fn weight_cap_blocks_submission() {
    let mut h = harness();
    let config = config_with("[rebalance]\nmax_weight_bps = 4000");
    let fund = fund([5000, 2500, 2500]).build();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));

    let result = run_cycle(&config, &fund, &source, &mut h.store, &mut h.audit, &forced());

    match result {
        Err(Error::RiskFailed(msg)) => assert!(msg.contains("Max weight")),
        other => panic!("expected RiskFailed, got {other:?}"),
    }
    assert!(fund.submissions().is_empty());
}

#[test]
fn unreachable_fund_fails_without_submitting() {
    let mut h = harness();
    let fund = fund([5000, 2500, 2500]).fail_reads().build();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));

    let result = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &forced());

    assert!(matches!(result, Err(Error::Fund(FundError::Read(_)))));
    assert!(fund.submissions().is_empty());
}

#[test]
fn rejected_submission_is_an_error() {
    let mut h = harness();
    let fund = fund([5000, 2500, 2500])
        .submit_mode(SubmitMode::Reject)
        .build();
    let source = FixedSignal(Some(signal("s1", &[0.25, 0.5, 0.25])));

    let result = run_cycle(&config(), &fund, &source, &mut h.store, &mut h.audit, &forced());

    assert!(matches!(result, Err(Error::Fund(FundError::Rejected(_)))));
    assert!(!audit_events(&h.audit_path).contains(&"weights_submitted".to_string()));
}

// ============================================================================
// File-backed run
// ============================================================================

#[test]
fn file_backed_run_updates_snapshot_and_outbox() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::write(
        root.join("fund.json"),
        r#"{
            "address": "0xfund",
            "assets": [
                { "symbol": "VIRTUAL", "value_cents": 50000 },
                { "symbol": "cbBTC", "value_cents": 25000 },
                { "symbol": "USDC", "value_cents": 25000 }
            ]
        }"#,
    )
    .unwrap();
    let doc = signal("file-1", &[0.25, 0.5, 0.25]);
    std::fs::write(root.join("signal.json"), serde_json::to_string(&doc).unwrap()).unwrap();

    let toml = format!(
        r#"
[fund]
address = "0xfund"
assets = ["VIRTUAL", "cbBTC", "USDC"]
snapshot = '{root}/fund.json'
outbox = '{root}/outbox.jsonl'

[signal]
store = '{root}/processed_signals.json'

[logging]
dir = '{root}/logs'
"#,
        root = root.display()
    );
    let config = Config::from_toml(&toml).unwrap();
    let opts = RunOptions {
        dry_run: false,
        force: true,
        signal_file: root.join("signal.json").display().to_string(),
    };

    let outcome = execution::run(&config, &opts).unwrap();
    assert!(matches!(outcome, CycleOutcome::Submitted { .. }));

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("fund.json")).unwrap()).unwrap();
    assert_eq!(snapshot["target_bps"], serde_json::json!([2500, 5000, 2500]));

    let outbox = std::fs::read_to_string(root.join("outbox.jsonl")).unwrap();
    assert_eq!(outbox.lines().count(), 1);

    let store = JsonFileStore::new(root.join("processed_signals.json"));
    assert!(store.load("file-1").unwrap().is_some());

    let events = audit_events(&config.audit_path());
    assert_eq!(events.first().map(String::as_str), Some("run_started"));
    assert_eq!(events.last().map(String::as_str), Some("run_completed"));

    // Second run: same signal comes from the store; holdings have not moved yet
    let again = execution::run(&config, &opts).unwrap();
    assert!(matches!(again, CycleOutcome::Submitted { .. }));
    let outbox = std::fs::read_to_string(root.join("outbox.jsonl")).unwrap();
    assert_eq!(outbox.lines().count(), 2);
    assert_eq!(store.records().unwrap().len(), 1);
}
