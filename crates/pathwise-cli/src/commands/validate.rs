//! The `pathwise validate` command.

use std::path::PathBuf;

use anyhow::Result;

use pathwise_core::graph::ConceptGraph;
use pathwise_core::parser::{load_catalogs, validate_concepts};

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalogs = load_catalogs(&catalog_path)?;
    if catalogs.is_empty() {
        anyhow::bail!("no catalog files found in {}", catalog_path.display());
    }

    for catalog in &catalogs {
        println!("Catalog: {} ({} concepts)", catalog.name, catalog.len());
    }

    let concepts: Vec<_> = catalogs.into_iter().flat_map(|c| c.concepts).collect();
    let warnings = validate_concepts(&concepts);
    for w in &warnings {
        let prefix = w
            .concept_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    let graph = ConceptGraph::build(concepts)?;
    println!(
        "Graph: {} concepts, {} prerequisite links, {} root(s)",
        graph.concepts().count(),
        graph.edge_count(),
        graph.roots().len()
    );

    if warnings.is_empty() {
        println!("All catalogs valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
