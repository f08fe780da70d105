//! pathwise configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pathwise_core::mastery::DEFAULT_MASTERY_THRESHOLD;
use pathwise_core::path::{CostPolicy, DEFAULT_MIN_EDGE_COST};
use pathwise_core::recommend::RecommendConfig;

/// Top-level pathwise configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwiseConfig {
    /// Score at or above which a concept counts as mastered.
    #[serde(default = "default_threshold")]
    pub mastery_threshold: f64,
    /// Edge pricing used for recommendations.
    #[serde(default)]
    pub cost_policy: CostPolicy,
    /// Floor for mastery-weighted edges.
    #[serde(default = "default_min_edge_cost")]
    pub min_edge_cost: f64,
    /// Alternative paths returned next to the best one.
    #[serde(default = "default_alternatives")]
    pub max_alternatives: usize,
    /// Upper bound on enumerated paths when looking for alternatives.
    #[serde(default = "default_enumeration_limit")]
    pub path_enumeration_limit: usize,
    /// Retries after a lost compare-and-swap when submitting a result.
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Catalog file or directory.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Mastery ledger file.
    #[serde(default)]
    pub ledger: Option<PathBuf>,
}

fn default_threshold() -> f64 {
    DEFAULT_MASTERY_THRESHOLD
}
fn default_min_edge_cost() -> f64 {
    DEFAULT_MIN_EDGE_COST
}
fn default_alternatives() -> usize {
    3
}
fn default_enumeration_limit() -> usize {
    64
}
fn default_conflict_retries() -> u32 {
    3
}

impl Default for PathwiseConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: default_threshold(),
            cost_policy: CostPolicy::default(),
            min_edge_cost: default_min_edge_cost(),
            max_alternatives: default_alternatives(),
            path_enumeration_limit: default_enumeration_limit(),
            max_conflict_retries: default_conflict_retries(),
            catalog: None,
            ledger: None,
        }
    }
}

impl PathwiseConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.mastery_threshold > 0.0 && self.mastery_threshold <= 1.0) {
            anyhow::bail!(
                "mastery_threshold must be in (0, 1], got {}",
                self.mastery_threshold
            );
        }
        if !(self.min_edge_cost > 0.0 && self.min_edge_cost.is_finite()) {
            anyhow::bail!(
                "min_edge_cost must be positive, got {}",
                self.min_edge_cost
            );
        }
        Ok(())
    }

    /// Settings for the recommendation service.
    pub fn recommend_config(&self) -> RecommendConfig {
        RecommendConfig {
            mastery_threshold: self.mastery_threshold,
            cost_policy: self.cost_policy,
            min_edge_cost: self.min_edge_cost,
            max_alternatives: self.max_alternatives,
            path_enumeration_limit: self.path_enumeration_limit,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let value = std::env::var(&result[start + 2..start + end]).unwrap_or_default();
        result.replace_range(start..start + end + 1, &value);
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the well-known paths.
///
/// Search order without an explicit path:
/// 1. `pathwise.toml` in the current directory
/// 2. `~/.config/pathwise/config.toml`
///
/// Environment variable overrides: `PATHWISE_CATALOG`, `PATHWISE_LEDGER`,
/// `PATHWISE_MASTERY_THRESHOLD`.
pub fn load_config_from(path: Option<&Path>) -> Result<PathwiseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("pathwise.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PathwiseConfig::default(),
    };

    // Apply env var overrides
    if let Ok(catalog) = std::env::var("PATHWISE_CATALOG") {
        config.catalog = Some(PathBuf::from(catalog));
    }
    if let Ok(ledger) = std::env::var("PATHWISE_LEDGER") {
        config.ledger = Some(PathBuf::from(ledger));
    }
    if let Ok(threshold) = std::env::var("PATHWISE_MASTERY_THRESHOLD") {
        config.mastery_threshold = threshold
            .trim()
            .parse()
            .with_context(|| format!("invalid PATHWISE_MASTERY_THRESHOLD: {threshold}"))?;
    }

    config.catalog = config.catalog.as_deref().map(resolve_path);
    config.ledger = config.ledger.as_deref().map(resolve_path);

    config.validate()?;
    tracing::debug!(source = ?config_path, "loaded configuration");
    Ok(config)
}

/// Parse a TOML configuration document.
pub fn parse_config_str(content: &str) -> Result<PathwiseConfig> {
    Ok(toml::from_str(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("pathwise"))
}
