//! pathwise-core: Concept graph, mastery ledger and learning-path search.
//!
//! This crate defines the data model, storage traits, graph validation, path
//! search and the recommendation service that the rest of pathwise builds on.

pub mod cache;
pub mod error;
pub mod graph;
pub mod mastery;
pub mod model;
pub mod parser;
pub mod path;
pub mod recommend;
pub mod traits;

#[cfg(test)]
mod test_support;
