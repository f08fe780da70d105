//! Versioned cache of the built concept graph.
//!
//! Holds at most one graph, keyed by the catalog version it was built from.
//! A version change or an explicit [`GraphCache::invalidate`] forces a rebuild.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{GraphError, RecommendError};
use crate::graph::ConceptGraph;
use crate::traits::ConceptStore;

struct CachedGraph {
    version: u64,
    graph: Arc<ConceptGraph>,
}

#[derive(Default)]
pub struct GraphCache {
    slot: Mutex<Option<CachedGraph>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the graph for the store's current catalog version, building it
    /// if needed. Build failures are not cached.
    pub async fn get_or_build(
        &self,
        store: &dyn ConceptStore,
    ) -> Result<Arc<ConceptGraph>, RecommendError> {
        let version = store
            .catalog_version()
            .await
            .map_err(|e| RecommendError::Storage(format!("{e:#}")))?;

        // Held across the rebuild so concurrent callers wait for one build.
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.version == version {
                return Ok(Arc::clone(&cached.graph));
            }
        }

        let concepts = store.list_concepts().await.map_err(catalog_error)?;
        let graph = Arc::new(ConceptGraph::build(concepts)?);
        tracing::info!(
            store = store.name(),
            version,
            concepts = graph.len(),
            "rebuilt concept graph"
        );

        *slot = Some(CachedGraph {
            version,
            graph: Arc::clone(&graph),
        });
        Ok(graph)
    }

    /// Drop the cached graph.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Catalog version of the cached graph, if any.
    pub async fn cached_version(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|c| c.version)
    }
}

/// Malformed catalog data reported by the store is structural; anything else
/// is a storage failure.
fn catalog_error(err: anyhow::Error) -> RecommendError {
    match err.chain().find_map(|cause| cause.downcast_ref::<GraphError>()) {
        Some(graph_err) => RecommendError::Graph(graph_err.clone()),
        None => RecommendError::Storage(format!("{err:#}")),
    }
}
