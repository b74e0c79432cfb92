//! JSONL audit trail logging.
//!
//! Each rebalancer cycle appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use whackrock::{Normalized, RebalanceReport};

use crate::error::Result;
use crate::fund::{Composition, Submission};
use crate::risk::RiskReport;
use crate::signal::DerivedWeights;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

pub fn log_run_started(audit: &mut AuditLog, signal_file: &str, fund: &str) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "signal_file": signal_file,
            "fund": fund,
        }),
    )
}

pub fn log_composition(audit: &mut AuditLog, composition: &Composition) -> Result<()> {
    audit.log(
        "composition_fetched",
        serde_json::json!({ "assets": composition.assets }),
    )
}

pub fn log_weights_derived(
    audit: &mut AuditLog,
    derived: &DerivedWeights,
    normalized: &Normalized,
) -> Result<()> {
    audit.log(
        "weights_derived",
        serde_json::json!({
            "origin": derived.origin,
            "signal_id": derived.signal.as_ref().map(|s| s.signal_id.as_str()),
            "weights": derived.weights.as_slice(),
            "bps": normalized.bps.as_slice(),
            "anomalies": normalized.anomalies.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
        }),
    )
}

pub fn log_decision(
    audit: &mut AuditLog,
    report: &RebalanceReport,
    rebalance: bool,
) -> Result<()> {
    audit.log(
        "decision",
        serde_json::json!({
            "report": report,
            "rebalance": rebalance,
        }),
    )
}

pub fn log_risk_check(audit: &mut AuditLog, report: &RiskReport) -> Result<()> {
    let check_data: Vec<_> = report
        .checks
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "status": format!("{}", c.status),
                "detail": c.detail,
            })
        })
        .collect();

    audit.log(
        "risk_check",
        serde_json::json!({
            "passed": !report.has_failures(),
            "checks": check_data,
        }),
    )
}

pub fn log_weights_submitted(audit: &mut AuditLog, submission: &Submission) -> Result<()> {
    audit.log(
        "weights_submitted",
        serde_json::json!({
            "request_id": submission.request_id,
            "fund": submission.fund,
            "weights": submission.weights.as_slice(),
        }),
    )
}

pub fn log_run_completed(audit: &mut AuditLog, outcome: &str) -> Result<()> {
    audit.log("run_completed", serde_json::json!({ "outcome": outcome }))
}
