//! Subcommand implementations.

pub mod init;
pub mod prerequisites;
pub mod recommend;
pub mod status;
pub mod submit;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use pathwise_core::recommend::RecommendationService;
use pathwise_store::{load_config_from, JsonLedger, PathwiseConfig, TomlCatalog};

use crate::StoreArgs;

/// Ledger file used when neither the flags nor the config name one.
const DEFAULT_LEDGER: &str = "pathwise-ledger.json";

/// Load the config and apply command-line overrides.
pub fn load_settings(args: &StoreArgs) -> Result<PathwiseConfig> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(catalog) = &args.catalog {
        config.catalog = Some(catalog.clone());
    }
    if let Some(ledger) = &args.ledger {
        config.ledger = Some(ledger.clone());
    }
    Ok(config)
}

pub fn catalog_path(config: &PathwiseConfig) -> Result<PathBuf> {
    config.catalog.clone().context(
        "no catalog configured: pass --catalog or set `catalog` in pathwise.toml (see `pathwise init`)",
    )
}

/// Wire the file-backed stores into a recommendation service.
pub fn build_service(config: &PathwiseConfig) -> Result<RecommendationService> {
    let catalog = TomlCatalog::open(catalog_path(config)?)?;
    let ledger_path = config
        .ledger
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER));
    tracing::debug!(
        catalog = %catalog.path().display(),
        ledger = %ledger_path.display(),
        "opening stores"
    );
    let ledger = JsonLedger::open(ledger_path)?;

    Ok(RecommendationService::new(
        Arc::new(catalog),
        Arc::new(ledger),
        config.recommend_config(),
    ))
}
