//! TOML catalog parser.
//!
//! Loads concept catalogs from TOML files and directories, and validates them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::GraphError;
use crate::model::{Catalog, Concept, ConceptId, MAX_COMPLEXITY, MIN_COMPLEXITY};

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    concepts: Vec<TomlConcept>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlConcept {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    complexity: Option<u8>,
    #[serde(default, alias = "hours")]
    estimated_learning_hours: f64,
    #[serde(default)]
    prerequisites: Vec<String>,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog` (useful for testing).
///
/// Content that does not match the catalog schema, such as a concept without
/// an `id`, is a [`GraphError::Build`].
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content).map_err(|e| {
        GraphError::Build(format!(
            "failed to parse TOML: {}: {}",
            source_path.display(),
            e.message()
        ))
    })?;

    let concepts = parsed
        .concepts
        .into_iter()
        .map(|c| {
            let mut concept = Concept::new(c.id, c.title)
                .with_hours(c.estimated_learning_hours)
                .with_prerequisites(c.prerequisites);
            if let Some(complexity) = c.complexity {
                concept = concept.with_complexity(complexity);
            }
            concept
        })
        .collect();

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        concepts,
    })
}

/// Load a catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// Recursively load all `.toml` catalog files from a directory.
///
/// Files are visited in name order so the result is stable across runs. A
/// file that fails to parse fails the whole load: its concepts would
/// otherwise turn into dangling prerequisites.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            catalogs.push(parse_catalog(&path)?);
        }
    }

    Ok(catalogs)
}

/// A warning from catalog validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The concept ID (if applicable).
    pub concept_id: Option<ConceptId>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn concept(id: &ConceptId, message: impl Into<String>) -> Self {
        Self {
            concept_id: Some(id.clone()),
            message: message.into(),
        }
    }
}

/// Validate a catalog for common issues.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = validate_concepts(&catalog.concepts);
    if catalog.concepts.is_empty() {
        warnings.insert(
            0,
            ValidationWarning {
                concept_id: None,
                message: format!("catalog '{}' has no concepts", catalog.id),
            },
        );
    }
    warnings
}

/// Validate a flat concept list, e.g. several catalogs merged together.
pub fn validate_concepts(concepts: &[Concept]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Check for duplicate concept IDs
    let mut seen_ids = HashSet::new();
    for concept in concepts {
        if !seen_ids.insert(&concept.id) {
            warnings.push(ValidationWarning::concept(
                &concept.id,
                format!("duplicate concept ID: {}", concept.id),
            ));
        }
    }

    for concept in concepts {
        if concept.id.as_str().trim().is_empty() {
            warnings.push(ValidationWarning {
                concept_id: None,
                message: "concept with empty id".into(),
            });
        }
        if concept.title.trim().is_empty() {
            warnings.push(ValidationWarning::concept(&concept.id, "title is empty"));
        }
        if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&concept.complexity) {
            warnings.push(ValidationWarning::concept(
                &concept.id,
                format!(
                    "complexity {} is outside {MIN_COMPLEXITY}..={MAX_COMPLEXITY}",
                    concept.complexity
                ),
            ));
        }
        if concept.prerequisites.contains(&concept.id) {
            warnings.push(ValidationWarning::concept(
                &concept.id,
                "concept lists itself as a prerequisite",
            ));
        }
    }

    // Prerequisites that no concept defines
    let missing: BTreeSet<(&ConceptId, &ConceptId)> = concepts
        .iter()
        .flat_map(|c| c.prerequisites.iter().map(move |p| (&c.id, p)))
        .filter(|(_, prereq)| !seen_ids.contains(prereq))
        .collect();
    for (id, prereq) in missing {
        warnings.push(ValidationWarning::concept(
            id,
            format!("prerequisite '{prereq}' is not defined in the catalog"),
        ));
    }

    warnings
}
