//! Error taxonomy for the pathwise engine.
//!
//! Structural errors ([`GraphError`]) make the catalog unusable and abort a
//! whole request. The rest are scoped to a single call.

use thiserror::Error;

use crate::model::{ConceptId, UserId};

/// Malformed or cyclic catalog data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The catalog contains data that cannot form a graph.
    #[error("malformed catalog: {0}")]
    Build(String),

    /// The prerequisite relation contains a cycle.
    #[error("prerequisite cycle detected: {}", format_cycle(.cycle))]
    Cycle { cycle: Vec<ConceptId> },
}

fn format_cycle(cycle: &[ConceptId]) -> String {
    let mut out = cycle
        .iter()
        .map(ConceptId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ");
    if let Some(first) = cycle.first() {
        out.push_str(" -> ");
        out.push_str(first.as_str());
    }
    out
}

/// Failures of the mastery ledger.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MasteryError {
    /// The concept is not part of the catalog.
    #[error("unknown concept: {0}")]
    UnknownConcept(ConceptId),

    /// A normalized score outside [0, 1] (or NaN) was submitted.
    #[error("invalid score {0}: must be within [0, 1]")]
    InvalidScore(f64),

    /// Another writer updated the record between read and write.
    #[error("concurrent update of mastery for {user}/{concept}")]
    Conflict { user: UserId, concept: ConceptId },

    /// The backing store failed.
    #[error("mastery storage error: {0}")]
    Storage(String),
}

impl MasteryError {
    /// Returns `true` if repeating the same call may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MasteryError::Conflict { .. })
    }
}

/// Failures of the path search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    /// A frontier or goal id is not in the graph.
    #[error("unknown concept: {0}")]
    UnknownConcept(ConceptId),

    /// No prerequisite chain connects the frontier to the goal.
    #[error("no learning path reaches {goal}")]
    NoPathFound { goal: ConceptId },
}

impl PathError {
    pub fn is_no_path(&self) -> bool {
        matches!(self, PathError::NoPathFound { .. })
    }
}

/// Errors surfaced by the recommendation service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommendError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Mastery(#[from] MasteryError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// The catalog store failed.
    #[error("catalog storage error: {0}")]
    Storage(String),
}

impl RecommendError {
    /// Returns `true` if the catalog itself must be fixed before any
    /// recommendation can succeed.
    pub fn is_structural(&self) -> bool {
        matches!(self, RecommendError::Graph(_))
    }

    /// Returns `true` if the goal simply cannot be reached yet.
    pub fn is_no_path(&self) -> bool {
        matches!(self, RecommendError::Path(p) if p.is_no_path())
    }
}
