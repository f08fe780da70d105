//! Process-local stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use pathwise_core::error::MasteryError;
use pathwise_core::model::{Concept, ConceptId, MasteryRecord, UserId};
use pathwise_core::traits::{ConceptStore, MasteryStore, Versioned, ABSENT_VERSION};

/// In-memory concept catalog. Every [`MemoryCatalog::replace`] bumps the version.
pub struct MemoryCatalog {
    concepts: RwLock<Vec<Concept>>,
    version: AtomicU64,
}

impl MemoryCatalog {
    pub fn new(concepts: Vec<Concept>) -> Self {
        Self {
            concepts: RwLock::new(concepts),
            version: AtomicU64::new(1),
        }
    }

    /// Swap the catalog content.
    pub async fn replace(&self, concepts: Vec<Concept>) {
        *self.concepts.write().await = concepts;
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConceptStore for MemoryCatalog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_concepts(&self) -> anyhow::Result<Vec<Concept>> {
        Ok(self.concepts.read().await.clone())
    }

    async fn catalog_version(&self) -> anyhow::Result<u64> {
        Ok(self.version.load(Ordering::SeqCst))
    }
}

pub(crate) type RecordKey = (UserId, ConceptId);

/// Applies a compare-and-swap to a record map. Shared with the JSON ledger.
pub(crate) fn swap_record(
    records: &mut HashMap<RecordKey, Versioned<MasteryRecord>>,
    user: &UserId,
    record: MasteryRecord,
    expected_version: u64,
) -> Result<u64, MasteryError> {
    let key = (user.clone(), record.concept_id.clone());
    let current = records.get(&key).map_or(ABSENT_VERSION, |v| v.version);
    if current != expected_version {
        return Err(MasteryError::Conflict {
            user: user.clone(),
            concept: record.concept_id,
        });
    }
    let version = current + 1;
    records.insert(
        key,
        Versioned {
            value: record,
            version,
        },
    );
    Ok(version)
}

pub(crate) fn records_of(
    records: &HashMap<RecordKey, Versioned<MasteryRecord>>,
    user: &UserId,
) -> Vec<MasteryRecord> {
    let mut out: Vec<MasteryRecord> = records
        .iter()
        .filter(|((u, _), _)| u == user)
        .map(|(_, v)| v.value.clone())
        .collect();
    out.sort_by(|a, b| a.concept_id.cmp(&b.concept_id));
    out
}

/// In-memory mastery ledger.
#[derive(Default)]
pub struct MemoryMasteryStore {
    records: Mutex<HashMap<RecordKey, Versioned<MasteryRecord>>>,
}

impl MemoryMasteryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MasteryStore for MemoryMasteryStore {
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
        swap_record(&mut records, user, record, expected_version)
    }
}
