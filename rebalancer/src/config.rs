//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Deserialize;
use whackrock::{DEFAULT_THRESHOLD_BPS, DEFAULT_TOLERANCE, TOTAL_BPS};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fund: FundConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The fund being managed and where its state lives.
#[derive(Debug, Clone, Deserialize)]
pub struct FundConfig {
    pub address: String,
    /// Asset symbols in the fund's on-chain order.
    pub assets: Vec<String>,
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,
    #[serde(default = "default_outbox")]
    pub outbox: PathBuf,
}

fn default_snapshot() -> PathBuf {
    "./fund.json".into()
}
fn default_outbox() -> PathBuf {
    "./outbox.jsonl".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_store")]
    pub store: PathBuf,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_store() -> PathBuf {
    "./processed_signals.json".into()
}
fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default = "default_threshold")]
    pub threshold_bps: u32,
    #[serde(default = "default_max_weight")]
    pub max_weight_bps: u32,
    /// Rebalance when the new target differs from the stored one, even
    /// without drift past the threshold.
    #[serde(default = "default_true")]
    pub trigger_on_target_change: bool,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            threshold_bps: default_threshold(),
            max_weight_bps: default_max_weight(),
            trigger_on_target_change: default_true(),
        }
    }
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD_BPS
}
fn default_max_weight() -> u32 {
    TOTAL_BPS
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_hashtags")]
    pub hashtags: Vec<String>,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hashtags: default_hashtags(),
        }
    }
}

fn default_hashtags() -> Vec<String> {
    vec!["#DeFi".into(), "#WhackRock".into()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.fund.address.trim().is_empty() {
            return Err(Error::Config("fund address must not be empty".into()));
        }
        if self.fund.assets.is_empty() {
            return Err(Error::Config("fund must list at least one asset".into()));
        }
        let mut seen = FxHashSet::default();
        for symbol in &self.fund.assets {
            if symbol.trim().is_empty() {
                return Err(Error::Config("empty asset symbol".into()));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(Error::Config(format!("duplicate asset: {symbol}")));
            }
        }
        if !self.signal.tolerance.is_finite() || self.signal.tolerance < 0.0 {
            return Err(Error::Config("signal tolerance must be finite and >= 0".into()));
        }
        if self.rebalance.threshold_bps > TOTAL_BPS {
            return Err(Error::Config(format!(
                "threshold_bps must be <= {TOTAL_BPS}"
            )));
        }
        if self.rebalance.max_weight_bps == 0 || self.rebalance.max_weight_bps > TOTAL_BPS {
            return Err(Error::Config(format!(
                "max_weight_bps must be in 1..={TOTAL_BPS}"
            )));
        }
        Ok(())
    }

    /// Number of assets the fund is expected to hold.
    pub fn asset_count(&self) -> usize {
        self.fund.assets.len()
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
