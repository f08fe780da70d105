//! pathwise-store: Storage backends and configuration for pathwise.
//!
//! Provides in-memory and file-backed implementations of the
//! [`ConceptStore`](pathwise_core::traits::ConceptStore) and
//! [`MasteryStore`](pathwise_core::traits::MasteryStore) traits, plus the
//! configuration loader shared by the binaries.

pub mod config;
pub mod json_ledger;
pub mod memory;
pub mod toml_catalog;

pub use config::{load_config_from, PathwiseConfig};
pub use json_ledger::JsonLedger;
pub use memory::{MemoryCatalog, MemoryMasteryStore};
pub use toml_catalog::TomlCatalog;
