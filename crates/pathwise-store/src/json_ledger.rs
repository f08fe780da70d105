//! Mastery store persisted as a JSON document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use pathwise_core::error::MasteryError;
use pathwise_core::model::{ConceptId, MasteryRecord, UserId};
use pathwise_core::traits::{MasteryStore, Versioned};

use crate::memory::{records_of, swap_record, RecordKey};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the ledger file.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    format_version: u32,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerEntry {
    user: UserId,
    version: u64,
    #[serde(flatten)]
    record: MasteryRecord,
}

/// Mastery store backed by a JSON file.
///
/// The whole document is loaded on open and rewritten after every successful
/// swap. A swap whose write fails is rolled back in memory.
pub struct JsonLedger {
    path: PathBuf,
    records: Mutex<HashMap<RecordKey, Versioned<MasteryRecord>>>,
}

impl JsonLedger {
    /// Open the ledger at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read ledger: {}", path.display()))?;
            let doc: LedgerDocument = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse ledger: {}", path.display()))?;
            if doc.format_version != FORMAT_VERSION {
                anyhow::bail!(
                    "unsupported ledger format version {} in {}",
                    doc.format_version,
                    path.display()
                );
            }
            doc.entries
                .into_iter()
                .map(|e| {
                    (
                        (e.user, e.record.concept_id.clone()),
                        Versioned {
                            value: e.record,
                            version: e.version,
                        },
                    )
                })
                .collect()
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), records = records.len(), "opened ledger");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(
        &self,
        records: &HashMap<RecordKey, Versioned<MasteryRecord>>,
    ) -> Result<()> {
        let mut entries: Vec<LedgerEntry> = records
            .iter()
            .map(|((user, _), v)| LedgerEntry {
                user: user.clone(),
                version: v.version,
                record: v.value.clone(),
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.user, &a.record.concept_id).cmp(&(&b.user, &b.record.concept_id))
        });

        let doc = LedgerDocument {
            format_version: FORMAT_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&doc)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write ledger: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace ledger: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl MasteryStore for JsonLedger {
    async fn list_mastery(&self, user: &UserId) -> Result<Vec<MasteryRecord>, MasteryError> {
        Ok(records_of(&*self.records.lock().await, user))
    }

    async fn get(
        &self,
        user: &UserId,
        concept: &ConceptId,
    ) -> Result<Option<Versioned<MasteryRecord>>, MasteryError> {
        let records = self.records.lock().await;
        Ok(records.get(&(user.clone(), concept.clone())).cloned())
    }

    async fn compare_and_swap(
        &self,
        user: &UserId,
        record: MasteryRecord,
        expected_version: u64,
    ) -> Result<u64, MasteryError> {
        let mut records = self.records.lock().await;
        let key = (user.clone(), record.concept_id.clone());
        let previous = records.get(&key).cloned();

        let version = swap_record(&mut records, user, record, expected_version)?;
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(prev) => records.insert(key, prev),
                None => records.remove(&key),
            };
            return Err(MasteryError::Storage(format!("{e:#}")));
        }
        Ok(version)
    }
}
