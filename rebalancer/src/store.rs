//! Processed-signal store.
//!
//! Remembers every signal the agent has acted on, keyed by signal id, so a
//! signal is applied once and the latest one can be reused when nothing new
//! arrives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::signal::SignalDocument;

/// A signal together with when the agent processed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    #[serde(flatten)]
    pub document: SignalDocument,
    pub processed_at: DateTime<Utc>,
}

impl SignalRecord {
    pub fn new(document: SignalDocument, processed_at: DateTime<Utc>) -> Self {
        Self {
            document,
            processed_at,
        }
    }
}

/// Keyed storage for processed signals.
pub trait SignalStore {
    fn load(&self, key: &str) -> Result<Option<SignalRecord>>;
    fn save(&mut self, key: &str, record: SignalRecord) -> Result<()>;

    /// All records, oldest first.
    fn records(&self) -> Result<Vec<SignalRecord>>;

    /// The most recently processed record.
    fn latest(&self) -> Result<Option<SignalRecord>> {
        Ok(self.records()?.pop())
    }
}

fn sort_by_processed(records: &mut [SignalRecord]) {
    records.sort_by(|a, b| {
        a.processed_at
            .cmp(&b.processed_at)
            .then_with(|| a.document.signal_id.cmp(&b.document.signal_id))
    });
}

/// A JSON object on disk, `{ "<signal id>": record, ... }`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, SignalRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::Store(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| Error::Store(format!("corrupt store {}: {e}", self.path.display())))
    }

    fn write_all(&self, records: &BTreeMap<String, SignalRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("cannot create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::Store(format!("cannot write {}: {e}", self.path.display())))
    }
}

impl SignalStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<SignalRecord>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&mut self, key: &str, record: SignalRecord) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), record);
        self.write_all(&all)
    }

    fn records(&self) -> Result<Vec<SignalRecord>> {
        let mut records: Vec<SignalRecord> = self.read_all()?.into_values().collect();
        sort_by_processed(&mut records);
        Ok(records)
    }
}

/// In-memory store for tests and one-off runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: FxHashMap<String, SignalRecord>,
}

impl SignalStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<SignalRecord>> {
        Ok(self.records.get(key).cloned())
    }

    fn save(&mut self, key: &str, record: SignalRecord) -> Result<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<SignalRecord>> {
        let mut records: Vec<SignalRecord> = self.records.values().cloned().collect();
        sort_by_processed(&mut records);
        Ok(records)
    }
}
