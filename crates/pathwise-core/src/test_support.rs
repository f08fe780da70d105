//! In-crate fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::MasteryError;
use crate::mastery::Clock;
use crate::model::{Concept, ConceptId, MasteryRecord, UserId};
use crate::traits::{ConceptStore, MasteryStore, Versioned};

pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn epoch() -> Self {
        Self(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    records: Mutex<HashMap<(UserId, ConceptId), Versioned<MasteryRecord>>>,
}

#[async_trait]
impl MasteryStore for MemoryLedgerStore {
    async fn list_mastery(&self, user: &UserId) -> Result<Vec<MasteryRecord>, MasteryError> {
        let records = self.records.lock().unwrap();
        let mut out: Vec<MasteryRecord> = records
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, v)| v.value.clone())
            .collect();
        out.sort_by(|a, b| a.concept_id.cmp(&b.concept_id));
        Ok(out)
    }

    async fn get(
        &self,
        user: &UserId,
        concept: &ConceptId,
    ) -> Result<Option<Versioned<MasteryRecord>>, MasteryError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&(user.clone(), concept.clone())).cloned())
    }

    async fn compare_and_swap(
        &self,
        user: &UserId,
        record: MasteryRecord,
        expected_version: u64,
    ) -> Result<u64, MasteryError> {
        let mut records = self.records.lock().unwrap();
        let key = (user.clone(), record.concept_id.clone());
        let current = records.get(&key).map_or(0, |v| v.version);
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
}

pub struct MemoryCatalog {
    concepts: Mutex<Vec<Concept>>,
    version: AtomicU64,
    pub list_calls: AtomicU32,
}

impl MemoryCatalog {
    pub fn new(concepts: Vec<Concept>) -> Self {
        Self {
            concepts: Mutex::new(concepts),
            version: AtomicU64::new(1),
            list_calls: AtomicU32::new(0),
        }
    }

    pub fn replace(&self, concepts: Vec<Concept>) {
        *self.concepts.lock().unwrap() = concepts;
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConceptStore for MemoryCatalog {
    fn name(&self) -> &str {
        "test-memory"
    }

    async fn list_concepts(&self) -> anyhow::Result<Vec<Concept>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.concepts.lock().unwrap().clone())
    }

    async fn catalog_version(&self) -> anyhow::Result<u64> {
        Ok(self.version.load(Ordering::SeqCst))
    }
}
