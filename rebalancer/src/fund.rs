//! Fund gateway: reading the fund's composition and stored target, and
//! submitting new target weights.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use whackrock::{BasisPointVector, composition_from_values};

use crate::config::FundConfig;

/// Errors at the fund boundary.
#[derive(Debug, thiserror::Error)]
pub enum FundError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("submission rejected: {0}")]
    Rejected(String),
}

pub type FundResult<T> = std::result::Result<T, FundError>;

/// One asset held by the fund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundAsset {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub current_bps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_cents: Option<i64>,
}

/// Live composition, in the fund's asset order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub assets: Vec<FundAsset>,
}

impl Composition {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn current_bps(&self) -> Vec<u32> {
        self.assets.iter().map(|a| a.current_bps).collect()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.symbol.as_str()).collect()
    }

    /// Per-asset values, when every asset reports one.
    pub fn values_cents(&self) -> Option<Vec<i64>> {
        self.assets.iter().map(|a| a.value_cents).collect()
    }
}

/// Receipt for a submitted weight change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub request_id: String,
    pub fund: String,
    pub weights: BasisPointVector,
    pub submitted_at: DateTime<Utc>,
}

/// Minimal fund API needed by the rebalancer runtime.
pub trait FundGateway {
    fn current_composition(&self) -> FundResult<Composition>;

    /// The target weights the fund currently stores. Empty if none is set.
    fn target_composition(&self) -> FundResult<Vec<u32>>;

    fn set_weights_and_rebalance(&self, weights: &BasisPointVector) -> FundResult<Submission>;
}

/// Fund state file written by the chain reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundSnapshot {
    pub address: String,
    pub assets: Vec<SnapshotAsset>,
    #[serde(default)]
    pub target_bps: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAsset {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub value_cents: i64,
}

/// File-backed gateway.
///
/// Reads the fund from a JSON snapshot. Submitting stores the new target in
/// the snapshot and appends a request to the outbox (JSONL) for an external
/// signer to execute.
#[derive(Debug, Clone)]
pub struct SnapshotFund {
    address: String,
    snapshot: PathBuf,
    outbox: PathBuf,
}

impl SnapshotFund {
    pub fn new(
        address: impl Into<String>,
        snapshot: impl Into<PathBuf>,
        outbox: impl Into<PathBuf>,
    ) -> Self {
        Self {
            address: address.into(),
            snapshot: snapshot.into(),
            outbox: outbox.into(),
        }
    }

    pub fn from_config(config: &FundConfig) -> Self {
        Self::new(&config.address, &config.snapshot, &config.outbox)
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot
    }

    fn read_snapshot(&self) -> FundResult<FundSnapshot> {
        let contents = fs::read_to_string(&self.snapshot)
            .map_err(|e| FundError::Read(format!("{}: {e}", self.snapshot.display())))?;
        let snapshot: FundSnapshot = serde_json::from_str(&contents)
            .map_err(|e| FundError::Read(format!("{}: {e}", self.snapshot.display())))?;
        if !snapshot.address.eq_ignore_ascii_case(&self.address) {
            return Err(FundError::Read(format!(
                "snapshot is for fund {}, expected {}",
                snapshot.address, self.address
            )));
        }
        Ok(snapshot)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.snapshot.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Atomic write: tmp file, then rename over the snapshot.
    fn write_snapshot(&self, snapshot: &FundSnapshot) -> FundResult<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| FundError::Write(e.to_string()))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|e| FundError::Write(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.snapshot)
            .map_err(|e| FundError::Write(format!("{}: {e}", self.snapshot.display())))
    }

    fn append_outbox(&self, submission: &Submission) -> FundResult<()> {
        if let Some(parent) = self.outbox.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| FundError::Write(format!("{}: {e}", parent.display())))?;
        }
        let line = serde_json::to_string(submission).map_err(|e| FundError::Write(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.outbox)
            .map_err(|e| FundError::Write(format!("{}: {e}", self.outbox.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| FundError::Write(format!("{}: {e}", self.outbox.display())))
    }
}

impl FundGateway for SnapshotFund {
    fn current_composition(&self) -> FundResult<Composition> {
        let snapshot = self.read_snapshot()?;
        if snapshot.assets.is_empty() {
            return Ok(Composition::default());
        }

        let values: Vec<i64> = snapshot.assets.iter().map(|a| a.value_cents).collect();
        let bps = composition_from_values(&values).map_err(|e| FundError::Read(e.to_string()))?;

        let assets = snapshot
            .assets
            .into_iter()
            .zip(bps)
            .map(|(a, current_bps)| FundAsset {
                symbol: a.symbol,
                address: a.address,
                current_bps,
                value_cents: Some(a.value_cents),
            })
            .collect();
        Ok(Composition { assets })
    }

    fn target_composition(&self) -> FundResult<Vec<u32>> {
        Ok(self.read_snapshot()?.target_bps)
    }

    fn set_weights_and_rebalance(&self, weights: &BasisPointVector) -> FundResult<Submission> {
        let mut snapshot = self.read_snapshot()?;
        if weights.len() != snapshot.assets.len() {
            return Err(FundError::Rejected(format!(
                "{} weights for {} assets",
                weights.len(),
                snapshot.assets.len()
            )));
        }

        let submitted_at = Utc::now();
        let submission = Submission {
            request_id: format!("{}-{}", self.address, submitted_at.timestamp_millis()),
            fund: self.address.clone(),
            weights: weights.clone(),
            submitted_at,
        };

        // Snapshot first, outbox last; a failed queue restores the old target.
        let previous = std::mem::replace(&mut snapshot.target_bps, weights.as_slice().to_vec());
        self.write_snapshot(&snapshot)?;

        if let Err(e) = self.append_outbox(&submission) {
            snapshot.target_bps = previous;
            if let Err(restore) = self.write_snapshot(&snapshot) {
                error!("Could not restore target in {}: {restore}", self.snapshot.display());
            }
            return Err(e);
        }
        Ok(submission)
    }
}
