//! Signal documents, where they come from, and how a cycle turns them into
//! fractional target weights.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use whackrock::WeightVector;

use crate::error::{Error, Result};
use crate::store::{SignalRecord, SignalStore};

/// Upstream sums further than this from 1.0 are divided through.
pub const SIGNAL_SUM_TOLERANCE: f64 = 0.001;

/// Market stance reported with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroTone {
    Bullish,
    Neutral,
    Bearish,
}

impl std::fmt::Display for MacroTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacroTone::Bullish => f.pad("BULLISH"),
            MacroTone::Neutral => f.pad("NEUTRAL"),
            MacroTone::Bearish => f.pad("BEARISH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskMode {
    On,
    Off,
}

impl std::fmt::Display for RiskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskMode::On => f.pad("ON"),
            RiskMode::Off => f.pad("OFF"),
        }
    }
}

/// One analysis published by the signal producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDocument {
    pub signal_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub macro_tone: MacroTone,
    pub risk_on_off: RiskMode,
    /// One fractional weight per fund asset, in fund order.
    pub weight_signal: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
}

impl SignalDocument {
    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the document against the fund's asset count.
    pub fn validate(&self, asset_count: usize) -> Result<()> {
        if self.signal_id.trim().is_empty() {
            return Err(Error::Signal("signalId is empty".into()));
        }
        if self.weight_signal.len() != asset_count {
            return Err(Error::Signal(format!(
                "signal {} carries {} weights, fund has {asset_count} assets",
                self.signal_id,
                self.weight_signal.len()
            )));
        }
        if let Some((i, w)) = self
            .weight_signal
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite())
        {
            return Err(Error::Signal(format!(
                "signal {} weight {i} is not finite ({w})",
                self.signal_id
            )));
        }
        Ok(())
    }

    /// Fractional weights, divided by their sum when it is off by more
    /// than [`SIGNAL_SUM_TOLERANCE`].
    pub fn weights(&self) -> WeightVector {
        let sum: f64 = self.weight_signal.iter().sum();
        if sum > 0.0 && (sum - 1.0).abs() > SIGNAL_SUM_TOLERANCE {
            WeightVector::new(self.weight_signal.iter().map(|w| w / sum).collect())
        } else {
            WeightVector::new(self.weight_signal.clone())
        }
    }
}

/// Anything that can hand the agent its newest signal.
pub trait SignalSource {
    /// The newest signal, or `None` when nothing has been published.
    fn fetch(&self) -> Result<Option<SignalDocument>>;
}

/// A signal document on disk. A missing file means no signal.
#[derive(Debug, Clone)]
pub struct FileSignal {
    path: PathBuf,
}

impl FileSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for FileSignal {
    fn fetch(&self) -> Result<Option<SignalDocument>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::SignalRead {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        SignalDocument::from_json(&contents).map(Some)
    }
}

/// A signal held in memory.
#[derive(Debug, Clone, Default)]
pub struct FixedSignal(pub Option<SignalDocument>);

impl SignalSource for FixedSignal {
    fn fetch(&self) -> Result<Option<SignalDocument>> {
        Ok(self.0.clone())
    }
}

/// Where a cycle's weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightOrigin {
    /// A signal seen for the first time this cycle.
    Fresh,
    /// The most recently processed signal.
    LastKnown,
    /// Equal weights; no usable signal.
    EqualFallback,
}

impl std::fmt::Display for WeightOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightOrigin::Fresh => write!(f, "fresh signal"),
            WeightOrigin::LastKnown => write!(f, "last known signal"),
            WeightOrigin::EqualFallback => write!(f, "equal-weight fallback"),
        }
    }
}

/// Fractional weights for a cycle and the signal behind them, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedWeights {
    pub weights: WeightVector,
    pub origin: WeightOrigin,
    pub signal: Option<SignalDocument>,
}

impl DerivedWeights {
    fn equal(asset_count: usize) -> Self {
        // equal(n) only fails for n == 0 or n > 10000; an empty vector then
        // surfaces as InvalidInput from the normalizer.
        let weights = WeightVector::equal(asset_count).unwrap_or_else(|e| {
            error!("Cannot build equal weights for {asset_count} assets: {e}");
            WeightVector::new(Vec::new())
        });
        Self {
            weights,
            origin: WeightOrigin::EqualFallback,
            signal: None,
        }
    }

    fn from_document(doc: SignalDocument, origin: WeightOrigin) -> Self {
        Self {
            weights: doc.weights(),
            origin,
            signal: Some(doc),
        }
    }
}

/// Pick this cycle's weights. Never fails.
///
/// A new, valid signal is recorded in `store` and used. An already processed
/// signal, or no signal at all, falls back to the latest stored record. With
/// no usable history, or on any source or store error, every asset gets an
/// equal share.
pub fn derive_weights(
    source: &dyn SignalSource,
    store: &mut dyn SignalStore,
    asset_count: usize,
) -> DerivedWeights {
    match try_derive(source, store, asset_count) {
        Ok(Some(derived)) => derived,
        Ok(None) => {
            warn!("No signal history; using equal weights for {asset_count} assets");
            DerivedWeights::equal(asset_count)
        }
        Err(e) => {
            error!("Signal unavailable ({e}); using equal weights for {asset_count} assets");
            DerivedWeights::equal(asset_count)
        }
    }
}

fn try_derive(
    source: &dyn SignalSource,
    store: &mut dyn SignalStore,
    asset_count: usize,
) -> Result<Option<DerivedWeights>> {
    if let Some(doc) = source.fetch()? {
        doc.validate(asset_count)?;
        if store.load(&doc.signal_id)?.is_none() {
            info!("New signal {}: {}", doc.signal_id, doc.title);
            let record = SignalRecord::new(doc.clone(), Utc::now());
            if let Err(e) = store.save(&doc.signal_id, record) {
                warn!("Could not record signal {}: {e}", doc.signal_id);
            }
            return Ok(Some(DerivedWeights::from_document(doc, WeightOrigin::Fresh)));
        }
        info!("Signal {} already processed", doc.signal_id);
    }

    let Some(latest) = store.latest()? else {
        return Ok(None);
    };
    if let Err(e) = latest.document.validate(asset_count) {
        warn!("Stored signal unusable: {e}");
        return Ok(None);
    }
    info!("Using last known signal {}", latest.document.signal_id);
    Ok(Some(DerivedWeights::from_document(
        latest.document,
        WeightOrigin::LastKnown,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn doc_json(id: &str, weights: &str) -> String {
        format!(
            r#"{{
                "signalId": "{id}",
                "title": "Bitcoin dominance is rising",
                "publishedAt": "2026-05-01T14:00:00Z",
                "macroTone": "bullish",
                "riskOnOff": "on",
                "weightSignal": {weights},
                "analysisSummary": "Rotate toward BTC."
            }}"#
        )
    }

    fn doc(id: &str, weights: &[f64]) -> SignalDocument {
        SignalDocument::from_json(&doc_json(id, &format!("{weights:?}"))).unwrap()
    }

    #[test]
    fn parse_camel_case_document() {
        let d = doc("abc123", &[0.2, 0.5, 0.3]);
        assert_eq!(d.signal_id, "abc123");
        assert_eq!(d.macro_tone, MacroTone::Bullish);
        assert_eq!(d.risk_on_off, RiskMode::On);
        assert_eq!(d.weight_signal, vec![0.2, 0.5, 0.3]);
        assert_eq!(d.analysis_summary.as_deref(), Some("Rotate toward BTC."));
    }

    #[test]
    fn summary_is_optional() {
        let json = r#"{
            "signalId": "x", "title": "t", "publishedAt": "2026-05-01T00:00:00Z",
            "macroTone": "neutral", "riskOnOff": "off", "weightSignal": [1.0]
        }"#;
        let d = SignalDocument::from_json(json).unwrap();
        assert!(d.analysis_summary.is_none());
        assert_eq!(d.risk_on_off, RiskMode::Off);
    }

    #[test]
    fn reject_unknown_tone() {
        let json = doc_json("x", "[1.0]").replace("bullish", "euphoric");
        assert!(SignalDocument::from_json(&json).is_err());
    }

    #[test]
    fn validate_length() {
        let d = doc("x", &[0.5, 0.5]);
        assert!(d.validate(2).is_ok());
        assert!(matches!(d.validate(3), Err(Error::Signal(_))));
    }

    #[test]
    fn weights_divided_when_off_sum() {
        let d = doc("x", &[2.0, 1.0, 1.0]);
        assert_eq!(d.weights().as_slice(), &[0.5, 0.25, 0.25]);
    }

    #[test]
    fn weights_kept_when_close_enough() {
        let d = doc("x", &[0.5, 0.3, 0.2005]);
        assert_eq!(d.weights().as_slice(), &[0.5, 0.3, 0.2005]);
    }

    #[test]
    fn missing_file_is_no_signal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSignal::new(dir.path().join("absent.json"));
        assert!(source.fetch().unwrap().is_none());
    }

    #[test]
    fn file_signal_reads_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.json");
        std::fs::write(&path, doc_json("file1", "[0.6, 0.4]")).unwrap();
        let d = FileSignal::new(&path).fetch().unwrap().unwrap();
        assert_eq!(d.signal_id, "file1");
    }

    #[test]
    fn fresh_signal_is_recorded() {
        let mut store = MemoryStore::default();
        let source = FixedSignal(Some(doc("s1", &[0.6, 0.4])));

        let derived = derive_weights(&source, &mut store, 2);
        assert_eq!(derived.origin, WeightOrigin::Fresh);
        assert_eq!(derived.weights.as_slice(), &[0.6, 0.4]);
        assert!(store.load("s1").unwrap().is_some());
    }

    #[test]
    fn processed_signal_uses_last_known() {
        let mut store = MemoryStore::default();
        let source = FixedSignal(Some(doc("s1", &[0.6, 0.4])));
        derive_weights(&source, &mut store, 2);

        let again = derive_weights(&source, &mut store, 2);
        assert_eq!(again.origin, WeightOrigin::LastKnown);
        assert_eq!(again.weights.as_slice(), &[0.6, 0.4]);
    }

    #[test]
    fn no_signal_no_history_is_equal() {
        let mut store = MemoryStore::default();
        let derived = derive_weights(&FixedSignal(None), &mut store, 3);
        assert_eq!(derived.origin, WeightOrigin::EqualFallback);
        assert_eq!(derived.weights.as_slice(), &[0.34, 0.33, 0.33]);
        assert!(derived.signal.is_none());
    }

    #[test]
    fn wrong_length_signal_falls_back() {
        let mut store = MemoryStore::default();
        let source = FixedSignal(Some(doc("bad", &[0.5, 0.5])));
        let derived = derive_weights(&source, &mut store, 3);
        assert_eq!(derived.origin, WeightOrigin::EqualFallback);
        assert!(store.load("bad").unwrap().is_none());
    }

    #[test]
    fn source_error_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut store = MemoryStore::default();

        let derived = derive_weights(&FileSignal::new(&path), &mut store, 2);
        assert_eq!(derived.origin, WeightOrigin::EqualFallback);
    }
}
