//! Storage trait definitions for the concept catalog and the mastery ledger.
//!
//! These async traits are implemented by the `pathwise-store` crate. The engine
//! never talks to a database directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MasteryError;
use crate::model::{Concept, ConceptId, MasteryRecord, UserId};

// ---------------------------------------------------------------------------
// Concept catalog
// ---------------------------------------------------------------------------

/// Read-only access to the concept catalog.
#[async_trait]
pub trait ConceptStore: Send + Sync {
    /// Human-readable backend name (e.g. "toml").
    fn name(&self) -> &str;

    /// Every concept in the current catalog snapshot.
    async fn list_concepts(&self) -> anyhow::Result<Vec<Concept>>;

    /// Changes whenever the catalog content changes.
    async fn catalog_version(&self) -> anyhow::Result<u64>;
}

// ---------------------------------------------------------------------------
// Mastery storage
// ---------------------------------------------------------------------------

/// A stored value together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    /// Starts at 1 on first write; 0 is reserved for "absent".
    pub version: u64,
}

/// Version to pass to [`MasteryStore::compare_and_swap`] when no record exists.
pub const ABSENT_VERSION: u64 = 0;

/// Persistent per-(user, concept) mastery records.
#[async_trait]
pub trait MasteryStore: Send + Sync {
    /// All records of one learner.
    async fn list_mastery(&self, user: &UserId) -> Result<Vec<MasteryRecord>, MasteryError>;

    /// The record for one (user, concept) pair, if any.
    async fn get(
        &self,
        user: &UserId,
        concept: &ConceptId,
    ) -> Result<Option<Versioned<MasteryRecord>>, MasteryError>;

    /// Store `record` only if the current version equals `expected_version`.
    ///
    /// Returns the new version, or [`MasteryError::Conflict`] if another
    /// writer got there first.
    async fn compare_and_swap(
        &self,
        user: &UserId,
        record: MasteryRecord,
        expected_version: u64,
    ) -> Result<u64, MasteryError>;
}
