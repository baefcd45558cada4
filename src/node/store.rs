//! Committee record store.
//!
//! One record per chain. Re-pushing the stored record is a no-op; a push that
//! only changes the access node list replaces that list; anything else that
//! differs is refused. With a data directory each record is kept as
//! `<chainId>.json` and reloaded on open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::committee::{record_differences, CommitteeRecord};
use crate::storage::{raw_files, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    Unchanged,
    AccessNodesUpdated,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record for {chain_id} conflicts in {fields:?}")]
    Conflict {
        chain_id: String,
        fields: Vec<&'static str>,
    },
    #[error("invalid chain id {0:?}")]
    InvalidChainId(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct RecordStore {
    dir: Option<PathBuf>,
    records: RwLock<HashMap<String, CommitteeRecord>>,
}

impl RecordStore {
    pub fn in_memory() -> Self {
        Self { dir: None, records: RwLock::new(HashMap::new()) }
    }

    /// Opens a store persisted under `dir`, loading every record found there.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let mut records = HashMap::new();
        for path in raw_files::list_files(&dir, "json")? {
            let bytes = raw_files::read_file(&path)?;
            let record: CommitteeRecord = serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Corruption(format!("{}: {}", path.display(), e)))?;
            records.insert(record.chain_id.clone(), record);
        }
        log::debug!("loaded {} committee record(s) from {}", records.len(), dir.display());
        Ok(Self { dir: Some(dir), records: RwLock::new(records) })
    }

    pub fn put(&self, record: CommitteeRecord) -> Result<PutOutcome, StoreError> {
        // Chain ids name files, so only plain hex text is accepted.
        if record.chain_id.is_empty() || !record.chain_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidChainId(record.chain_id));
        }

        let mut records = self.records.write();
        let outcome = match records.get(&record.chain_id) {
            Some(stored) if *stored == record => return Ok(PutOutcome::Unchanged),
            Some(stored) => {
                let fields = record_differences(stored, &record);
                if !fields.is_empty() {
                    return Err(StoreError::Conflict { chain_id: record.chain_id, fields });
                }
                PutOutcome::AccessNodesUpdated
            }
            None => PutOutcome::Stored,
        };

        self.persist(&record)?;
        records.insert(record.chain_id.clone(), record);
        Ok(outcome)
    }

    pub fn get(&self, chain_id: &str) -> Option<CommitteeRecord> {
        self.records.read().get(chain_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn persist(&self, record: &CommitteeRecord) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StorageError::Corruption(e.to_string()))?;
        raw_files::write_atomic(dir.join(format!("{}.json", record.chain_id)), &bytes)?;
        Ok(())
    }
}
