//! Core data model types for pathwise.
//!
//! These are the fundamental types that the whole system uses to represent
//! concepts, learners, mastery records and derived topic status.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a concept in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ConceptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of a learner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lowest allowed complexity rating.
pub const MIN_COMPLEXITY: u8 = 1;
/// Highest allowed complexity rating.
pub const MAX_COMPLEXITY: u8 = 5;
/// Complexity assumed when the catalog does not specify one.
pub const DEFAULT_COMPLEXITY: u8 = 3;

/// An atomic learning topic with a complexity rating and prerequisite set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Unique identifier.
    pub id: ConceptId,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Difficulty rating from 1 (trivial) to 5 (hard).
    #[serde(default = "default_complexity")]
    pub complexity: u8,
    /// Rough effort estimate in hours.
    #[serde(default)]
    pub estimated_learning_hours: f64,
    /// Concepts that must be mastered first.
    #[serde(default)]
    pub prerequisites: BTreeSet<ConceptId>,
}

fn default_complexity() -> u8 {
    DEFAULT_COMPLEXITY
}

impl Concept {
    /// Create a concept with default complexity and no prerequisites.
    pub fn new(id: impl Into<ConceptId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            complexity: DEFAULT_COMPLEXITY,
            estimated_learning_hours: 0.0,
            prerequisites: BTreeSet::new(),
        }
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_learning_hours = hours;
        self
    }

    pub fn with_prerequisites<I, T>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ConceptId>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }
}

/// A named collection of concepts loaded from one catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub concepts: Vec<Concept>,
}

impl Catalog {
    /// Total number of concepts.
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

/// A learner's mastery of one concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    /// The concept this record tracks.
    pub concept_id: ConceptId,
    /// Confidence in [0, 1]; 0 = unknown, 1 = fully mastered.
    pub score: f64,
    /// Number of quiz submissions recorded so far.
    pub attempts: u32,
    /// When the record was last changed.
    pub last_updated: DateTime<Utc>,
}

/// Unlock state of a concept for one learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicStatus {
    NotStarted,
    Ready,
    InProgress,
    Mastered,
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicStatus::NotStarted => write!(f, "not-started"),
            TopicStatus::Ready => write!(f, "ready"),
            TopicStatus::InProgress => write!(f, "in-progress"),
            TopicStatus::Mastered => write!(f, "mastered"),
        }
    }
}

impl FromStr for TopicStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "not-started" | "locked" => Ok(TopicStatus::NotStarted),
            "ready" => Ok(TopicStatus::Ready),
            "in-progress" => Ok(TopicStatus::InProgress),
            "mastered" => Ok(TopicStatus::Mastered),
            other => Err(format!("unknown topic status: {other}")),
        }
    }
}
