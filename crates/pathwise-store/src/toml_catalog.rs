//! Concept catalog backed by TOML files.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use pathwise_core::model::{Catalog, Concept};
use pathwise_core::parser::load_catalogs;
use pathwise_core::traits::ConceptStore;

/// Catalog read from a single TOML file or a directory of them.
///
/// Files are re-read on every call, so edits on disk are picked up without a
/// restart. The version is a hash of the file names and contents.
pub struct TomlCatalog {
    path: PathBuf,
}

impl TomlCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open `path`, failing early if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            anyhow::bail!("catalog not found: {}", path.display());
        }
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed catalogs, one per file.
    pub fn catalogs(&self) -> Result<Vec<Catalog>> {
        load_catalogs(&self.path)
            .with_context(|| format!("failed to load catalog: {}", self.path.display()))
    }

    fn fingerprint(&self) -> Result<u64> {
        let mut files = Vec::new();
        if self.path.is_file() {
            files.push(self.path.clone());
        } else if self.path.is_dir() {
            collect_toml_files(&self.path, &mut files)?;
        } else {
            anyhow::bail!("catalog not found: {}", self.path.display());
        }
        files.sort();

        let mut hasher = DefaultHasher::new();
        for file in &files {
            let content = std::fs::read(file)
                .with_context(|| format!("failed to read catalog file: {}", file.display()))?;
            file.hash(&mut hasher);
            content.hash(&mut hasher);
        }
        Ok(hasher.finish())
    }
}

fn collect_toml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_toml_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            out.push(path);
        }
    }
    Ok(())
}

#[async_trait]
impl ConceptStore for TomlCatalog {
    fn name(&self) -> &str {
        "toml"
    }

    async fn list_concepts(&self) -> Result<Vec<Concept>> {
        let catalogs = self.catalogs()?;
        tracing::debug!(
            path = %self.path.display(),
            catalogs = catalogs.len(),
            "loaded catalog files"
        );
        Ok(catalogs.into_iter().flat_map(|c| c.concepts).collect())
    }

    async fn catalog_version(&self) -> Result<u64> {
        self.fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pathwise_core::error::{GraphError, RecommendError};
    use pathwise_core::recommend::{RecommendConfig, RecommendationService};

    use crate::memory::MemoryMasteryStore;

    const BASICS: &str = r#"
[catalog]
id = "basics"
name = "Basics"

[[concepts]]
id = "variables"
title = "Variables"
complexity = 1

[[concepts]]
id = "loops"
title = "Loops"
prerequisites = ["variables"]
"#;

    const ARRAYS: &str = r#"
[catalog]
id = "arrays"
name = "Arrays"

[[concepts]]
id = "arrays"
title = "Arrays"
complexity = 2
prerequisites = ["loops"]
"#;

    #[tokio::test]
    async fn single_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("basics.toml");
        std::fs::write(&file, BASICS).unwrap();

        let catalog = TomlCatalog::open(&file).unwrap();
        let concepts = catalog.list_concepts().await.unwrap();
        assert_eq!(concepts.len(), 2);
        assert_eq!(catalog.name(), "toml");
    }

    #[tokio::test]
    async fn directory_catalog_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("basics.toml"), BASICS).unwrap();
        std::fs::write(dir.path().join("arrays.toml"), ARRAYS).unwrap();

        let catalog = TomlCatalog::open(dir.path()).unwrap();
        let mut ids: Vec<String> = catalog
            .list_concepts()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["arrays", "loops", "variables"]);
    }

    #[tokio::test]
    async fn version_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("basics.toml");
        std::fs::write(&file, BASICS).unwrap();
        let catalog = TomlCatalog::open(dir.path()).unwrap();

        let v1 = catalog.catalog_version().await.unwrap();
        assert_eq!(catalog.catalog_version().await.unwrap(), v1);

        std::fs::write(dir.path().join("arrays.toml"), ARRAYS).unwrap();
        let v2 = catalog.catalog_version().await.unwrap();
        assert_ne!(v1, v2);

        std::fs::write(&file, BASICS.replace("Loops", "While loops")).unwrap();
        assert_ne!(catalog.catalog_version().await.unwrap(), v2);
    }

    #[tokio::test]
    async fn malformed_file_in_directory_aborts_recommendation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("arrays.toml"), ARRAYS).unwrap();
        std::fs::write(
            dir.path().join("basics.toml"),
            format!("{BASICS}\n[[concepts]]\ntitle = \"Missing id\"\n"),
        )
        .unwrap();

        let catalog = Arc::new(TomlCatalog::open(dir.path()).unwrap());
        let err = catalog.list_concepts().await.unwrap_err();
        assert!(format!("{err:#}").contains("basics.toml"));

        let service = RecommendationService::new(
            catalog,
            Arc::new(MemoryMasteryStore::new()),
            RecommendConfig::default(),
        );
        let err = service
            .recommend(&"u".into(), &"arrays".into())
            .await
            .unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(err, RecommendError::Graph(GraphError::Build(_))));
    }

    #[test]
    fn open_missing_path_fails() {
        assert!(TomlCatalog::open("/no/such/catalog.toml").is_err());
    }
}
