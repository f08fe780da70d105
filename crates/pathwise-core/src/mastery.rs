//! Mastery ledger: quiz-result aggregation and topic-status derivation.
//!
//! Scores follow a damped running average, `min((old + new) / 2, 1)`, so a
//! single attempt cannot swing mastery from one extreme to the other. Status
//! is derived from the records and the graph on every query.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::MasteryError;
use crate::graph::ConceptGraph;
use crate::model::{ConceptId, MasteryRecord, TopicStatus, UserId};
use crate::path::MasteryLookup;
use crate::traits::{MasteryStore, ABSENT_VERSION};

/// Score at or above which a concept counts as mastered.
pub const DEFAULT_MASTERY_THRESHOLD: f64 = 0.6;

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Apply one normalized quiz result to the previous record (if any).
pub fn apply_result(
    previous: Option<&MasteryRecord>,
    concept: &ConceptId,
    normalized_score: f64,
    now: DateTime<Utc>,
) -> MasteryRecord {
    match previous {
        None => MasteryRecord {
            concept_id: concept.clone(),
            score: normalized_score,
            attempts: 1,
            last_updated: now,
        },
        Some(prev) => MasteryRecord {
            concept_id: concept.clone(),
            score: ((prev.score + normalized_score) / 2.0).min(1.0),
            attempts: prev.attempts.saturating_add(1),
            last_updated: now,
        },
    }
}

fn check_score(score: f64) -> Result<(), MasteryError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(MasteryError::InvalidScore(score))
    }
}

fn check_concept(graph: &ConceptGraph, concept: &ConceptId) -> Result<(), MasteryError> {
    if graph.is_catalog_concept(concept.as_str()) {
        Ok(())
    } else {
        Err(MasteryError::UnknownConcept(concept.clone()))
    }
}

/// Per-user, per-concept mastery over a [`MasteryStore`].
#[derive(Clone)]
pub struct MasteryLedger {
    store: Arc<dyn MasteryStore>,
    clock: Arc<dyn Clock>,
}

impl MasteryLedger {
    pub fn new(store: Arc<dyn MasteryStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record a quiz result already normalized to [0, 1].
    ///
    /// Performs a single compare-and-swap keyed by (user, concept). A lost race
    /// is returned as [`MasteryError::Conflict`]; retrying is up to the caller.
    pub async fn record_quiz_result(
        &self,
        user: &UserId,
        concept: &ConceptId,
        normalized_score: f64,
        graph: &ConceptGraph,
    ) -> Result<MasteryRecord, MasteryError> {
        check_score(normalized_score)?;
        check_concept(graph, concept)?;

        let current = self.store.get(user, concept).await?;
        let expected_version = current.as_ref().map_or(ABSENT_VERSION, |v| v.version);
        let record = apply_result(
            current.as_ref().map(|v| &v.value),
            concept,
            normalized_score,
            self.clock.now(),
        );

        let version = self
            .store
            .compare_and_swap(user, record.clone(), expected_version)
            .await?;

        tracing::info!(
            user = %user,
            concept = %concept,
            score = record.score,
            attempts = record.attempts,
            version,
            "recorded quiz result"
        );
        Ok(record)
    }

    /// All records of one learner, keyed by concept.
    pub async fn snapshot(&self, user: &UserId) -> Result<MasterySnapshot, MasteryError> {
        let records = self.store.list_mastery(user).await?;
        Ok(MasterySnapshot::from_records(records))
    }

    /// Current status of one concept for one learner.
    pub async fn status_of(
        &self,
        user: &UserId,
        concept: &ConceptId,
        graph: &ConceptGraph,
        threshold: f64,
    ) -> Result<TopicStatus, MasteryError> {
        check_concept(graph, concept)?;
        let snapshot = self.snapshot(user).await?;
        snapshot.status_of(graph, concept, threshold)
    }
}

/// Point-in-time view of one learner's mastery records.
#[derive(Debug, Clone, Default)]
pub struct MasterySnapshot {
    records: HashMap<ConceptId, MasteryRecord>,
}

impl MasterySnapshot {
    pub fn from_records(records: impl IntoIterator<Item = MasteryRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.concept_id.clone(), r))
                .collect(),
        }
    }

    pub fn record(&self, concept: &ConceptId) -> Option<&MasteryRecord> {
        self.records.get(concept)
    }

    pub fn score_of(&self, concept: &ConceptId) -> f64 {
        self.records.get(concept).map_or(0.0, |r| r.score)
    }

    pub fn attempts_of(&self, concept: &ConceptId) -> u32 {
        self.records.get(concept).map_or(0, |r| r.attempts)
    }

    fn is_mastered(&self, concept: &ConceptId, threshold: f64) -> bool {
        self.score_of(concept) >= threshold
    }

    /// Derive the status of `concept`.
    ///
    /// - mastered if score ≥ threshold
    /// - in-progress if attempted at least once
    /// - ready if every prerequisite is mastered
    /// - not-started otherwise
    pub fn status_of(
        &self,
        graph: &ConceptGraph,
        concept: &ConceptId,
        threshold: f64,
    ) -> Result<TopicStatus, MasteryError> {
        check_concept(graph, concept)?;

        if let Some(record) = self.records.get(concept) {
            if record.score >= threshold {
                return Ok(TopicStatus::Mastered);
            }
            if record.attempts > 0 {
                return Ok(TopicStatus::InProgress);
            }
        }

        let unlocked = graph
            .predecessors(concept.as_str())
            .all(|prereq| self.is_mastered(prereq, threshold));
        Ok(if unlocked {
            TopicStatus::Ready
        } else {
            TopicStatus::NotStarted
        })
    }

    /// Status of every catalog concept, in id order.
    pub fn statuses(&self, graph: &ConceptGraph, threshold: f64) -> BTreeMap<ConceptId, TopicStatus> {
        graph
            .concepts()
            .filter_map(|c| {
                self.status_of(graph, &c.id, threshold)
                    .ok()
                    .map(|s| (c.id.clone(), s))
            })
            .collect()
    }

    /// Catalog concepts currently mastered, in id order.
    pub fn mastered_concepts(&self, graph: &ConceptGraph, threshold: f64) -> Vec<ConceptId> {
        self.with_status(graph, threshold, TopicStatus::Mastered)
    }

    /// Catalog concepts that can be started right now, in id order.
    pub fn ready_concepts(&self, graph: &ConceptGraph, threshold: f64) -> Vec<ConceptId> {
        self.with_status(graph, threshold, TopicStatus::Ready)
    }

    fn with_status(
        &self,
        graph: &ConceptGraph,
        threshold: f64,
        wanted: TopicStatus,
    ) -> Vec<ConceptId> {
        self.statuses(graph, threshold)
            .into_iter()
            .filter(|(_, status)| *status == wanted)
            .map(|(id, _)| id)
            .collect()
    }
}

impl MasteryLookup for MasterySnapshot {
    fn mastery_of(&self, concept: &ConceptId) -> f64 {
        self.score_of(concept)
    }
}

/// Run `op` until it stops failing with [`MasteryError::Conflict`], at most
/// `max_retries` extra times.
pub async fn retry_on_conflict<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, MasteryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MasteryError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_conflict() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!("{e}, retrying ({attempt}/{max_retries})");
            }
            other => return other,
        }
    }
}
