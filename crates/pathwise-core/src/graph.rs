//! Prerequisite graph construction and validation.
//!
//! Concepts live in an arena indexed by [`NodeIndex`]. Indices are assigned in
//! concept-id order, so comparing index sequences compares id sequences.
//! Edges point from a prerequisite to the concept that requires it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use crate::error::GraphError;
use crate::model::{Concept, ConceptId, MAX_COMPLEXITY, MIN_COMPLEXITY};

/// Dense index of a node in a [`ConceptGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    concept: Concept,
    /// Referenced as a prerequisite but absent from the catalog.
    dangling: bool,
}

/// Immutable, validated prerequisite DAG.
#[derive(Debug, Clone)]
pub struct ConceptGraph {
    nodes: Vec<Node>,
    index: HashMap<ConceptId, NodeIndex>,
    successors: Vec<Vec<NodeIndex>>,
    predecessors: Vec<Vec<NodeIndex>>,
}

impl ConceptGraph {
    /// Build and validate the graph for a catalog snapshot.
    ///
    /// Every id referenced either as a concept or as a prerequisite becomes a
    /// node. Malformed entries are rejected with [`GraphError::Build`], a
    /// prerequisite cycle with [`GraphError::Cycle`].
    pub fn build<I>(concepts: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Concept>,
    {
        let graph = Self::assemble(concepts)?;
        validate_acyclic(&graph)?;
        tracing::debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "built concept graph"
        );
        Ok(graph)
    }

    fn assemble<I>(concepts: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Concept>,
    {
        let mut catalog: BTreeMap<ConceptId, Concept> = BTreeMap::new();
        for concept in concepts {
            check_concept(&concept)?;
            if catalog.contains_key(&concept.id) {
                return Err(GraphError::Build(format!(
                    "duplicate concept id: {}",
                    concept.id
                )));
            }
            catalog.insert(concept.id.clone(), concept);
        }

        let mut nodes: BTreeMap<ConceptId, Node> = BTreeMap::new();
        for concept in catalog.values() {
            for prereq in &concept.prerequisites {
                if !catalog.contains_key(prereq) && !nodes.contains_key(prereq) {
                    tracing::warn!(
                        concept = %concept.id,
                        prerequisite = %prereq,
                        "prerequisite missing from catalog"
                    );
                    nodes.insert(
                        prereq.clone(),
                        Node {
                            concept: Concept::new(prereq.clone(), prereq.as_str()),
                            dangling: true,
                        },
                    );
                }
            }
        }
        for (id, concept) in catalog {
            nodes.insert(
                id,
                Node {
                    concept,
                    dangling: false,
                },
            );
        }

        let nodes: Vec<Node> = nodes.into_values().collect();
        let index: HashMap<ConceptId, NodeIndex> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.concept.id.clone(), NodeIndex(i)))
            .collect();

        let mut successors = vec![Vec::new(); nodes.len()];
        let mut predecessors = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for prereq in &node.concept.prerequisites {
                let from = index[prereq];
                successors[from.0].push(NodeIndex(i));
                predecessors[i].push(from);
            }
        }
        // Prerequisites come from a BTreeSet, so predecessor lists are already
        // sorted; successor lists are filled in node order, which is id order.

        Ok(Self {
            nodes,
            index,
            successors,
            predecessors,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether `id` is a real catalog concept (not a dangling reference).
    pub fn is_catalog_concept(&self, id: &str) -> bool {
        self.node_index(id).is_some_and(|ix| !self.is_dangling(ix))
    }

    pub fn id(&self, ix: NodeIndex) -> &ConceptId {
        &self.nodes[ix.0].concept.id
    }

    pub fn concept_at(&self, ix: NodeIndex) -> &Concept {
        &self.nodes[ix.0].concept
    }

    /// Look up a catalog concept. Dangling references return `None`.
    pub fn concept(&self, id: &str) -> Option<&Concept> {
        self.node_index(id)
            .filter(|&ix| !self.is_dangling(ix))
            .map(|ix| self.concept_at(ix))
    }

    pub fn is_dangling(&self, ix: NodeIndex) -> bool {
        self.nodes[ix.0].dangling
    }

    /// All node indices in concept-id order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// Catalog concepts in id order, dangling references skipped.
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.dangling)
            .map(|n| &n.concept)
    }

    pub fn successors_of(&self, ix: NodeIndex) -> &[NodeIndex] {
        &self.successors[ix.0]
    }

    pub fn predecessors_of(&self, ix: NodeIndex) -> &[NodeIndex] {
        &self.predecessors[ix.0]
    }

    /// Concepts that list `id` as a prerequisite.
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &ConceptId> + '_ {
        let slice = self
            .node_index(id)
            .map(|ix| self.successors_of(ix))
            .unwrap_or(&[]);
        slice.iter().map(move |&ix| self.id(ix))
    }

    /// Direct prerequisites of `id`.
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &ConceptId> + '_ {
        let slice = self
            .node_index(id)
            .map(|ix| self.predecessors_of(ix))
            .unwrap_or(&[]);
        slice.iter().map(move |&ix| self.id(ix))
    }

    /// Catalog concepts with no prerequisites.
    pub fn roots(&self) -> Vec<NodeIndex> {
        self.indices()
            .filter(|&ix| !self.is_dangling(ix) && self.predecessors_of(ix).is_empty())
            .collect()
    }

    /// Topological order; among available nodes the smallest id comes first.
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .indices()
            .filter(|ix| in_degree[ix.0] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(ix)) = ready.pop() {
            order.push(ix);
            for &next in self.successors_of(ix) {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        order
    }

    /// Every transitive prerequisite of `id`, earliest first.
    ///
    /// Returns `None` if `id` is not in the graph.
    pub fn prerequisite_closure(&self, id: &str) -> Option<Vec<&ConceptId>> {
        let target = self.node_index(id)?;
        let ancestors = self.ancestors(target);
        Some(
            self.topological_order()
                .into_iter()
                .filter(|&ix| ix != target && ancestors[ix.0])
                .map(|ix| self.id(ix))
                .collect(),
        )
    }

    /// Marks `target` and every node with a directed path to it.
    pub(crate) fn ancestors(&self, target: NodeIndex) -> Vec<bool> {
        let mut seen = vec![false; self.len()];
        let mut stack = vec![target];
        seen[target.0] = true;
        while let Some(ix) = stack.pop() {
            for &prev in self.predecessors_of(ix) {
                if !seen[prev.0] {
                    seen[prev.0] = true;
                    stack.push(prev);
                }
            }
        }
        seen
    }
}

fn check_concept(concept: &Concept) -> Result<(), GraphError> {
    if concept.id.as_str().trim().is_empty() {
        return Err(GraphError::Build(format!(
            "concept with empty id (title: {:?})",
            concept.title
        )));
    }
    if concept.prerequisites.contains(&concept.id) {
        return Err(GraphError::Build(format!(
            "concept {} lists itself as a prerequisite",
            concept.id
        )));
    }
    if let Some(blank) = concept
        .prerequisites
        .iter()
        .find(|p| p.as_str().trim().is_empty())
    {
        return Err(GraphError::Build(format!(
            "concept {} has an empty prerequisite id {:?}",
            concept.id,
            blank.as_str()
        )));
    }
    if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&concept.complexity) {
        return Err(GraphError::Build(format!(
            "concept {} has complexity {} outside {MIN_COMPLEXITY}..={MAX_COMPLEXITY}",
            concept.id, concept.complexity
        )));
    }
    if !concept.estimated_learning_hours.is_finite() || concept.estimated_learning_hours < 0.0 {
        return Err(GraphError::Build(format!(
            "concept {} has invalid estimated_learning_hours {}",
            concept.id, concept.estimated_learning_hours
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Reject graphs whose prerequisite relation contains a cycle.
///
/// The reported cycle lists its nodes in edge order, rotated so that the
/// smallest id comes first.
pub fn validate_acyclic(graph: &ConceptGraph) -> Result<(), GraphError> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut path = Vec::new();

    for ix in graph.indices() {
        if marks[ix.0] == Mark::Unvisited {
            visit(graph, ix, &mut marks, &mut path)?;
        }
    }
    Ok(())
}

fn visit(
    graph: &ConceptGraph,
    node: NodeIndex,
    marks: &mut [Mark],
    path: &mut Vec<NodeIndex>,
) -> Result<(), GraphError> {
    marks[node.0] = Mark::OnPath;
    path.push(node);

    for &next in graph.successors_of(node) {
        match marks[next.0] {
            Mark::Done => {}
            Mark::Unvisited => visit(graph, next, marks, path)?,
            Mark::OnPath => {
                let start = path.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle: Vec<NodeIndex> = path[start..].to_vec();
                if let Some(min_pos) = cycle
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, ix)| **ix)
                    .map(|(i, _)| i)
                {
                    cycle.rotate_left(min_pos);
                }
                return Err(GraphError::Cycle {
                    cycle: cycle.into_iter().map(|ix| graph.id(ix).clone()).collect(),
                });
            }
        }
    }

    path.pop();
    marks[node.0] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(id: &str, prereqs: &[&str]) -> Concept {
        Concept::new(id, id.to_uppercase()).with_prerequisites(prereqs.iter().copied())
    }

    fn ids<'a>(it: impl IntoIterator<Item = &'a ConceptId>) -> Vec<&'a str> {
        it.into_iter().map(ConceptId::as_str).collect()
    }

    #[test]
    fn builds_chain_with_edges_in_both_directions() {
        let graph = ConceptGraph::build(vec![
            concept("a", &[]),
            concept("b", &["a"]),
            concept("c", &["b"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(ids(graph.successors("a")), vec!["b"]);
        assert_eq!(ids(graph.predecessors("c")), vec!["b"]);
        assert!(graph.predecessors("a").next().is_none());
        assert!(graph.successors("missing").next().is_none());
    }

    #[test]
    fn dangling_prerequisite_becomes_node() {
        let graph = ConceptGraph::build(vec![concept("b", &["ghost"])]).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.contains("ghost"));
        assert!(!graph.is_catalog_concept("ghost"));
        assert!(graph.concept("ghost").is_none());
        assert_eq!(ids(graph.successors("ghost")), vec!["b"]);
        // Dangling nodes are not learnable entry points.
        assert!(graph.roots().is_empty());
    }

    #[test]
    fn indices_follow_id_order() {
        let graph = ConceptGraph::build(vec![
            concept("zeta", &[]),
            concept("alpha", &[]),
            concept("mid", &["zeta", "alpha"]),
        ])
        .unwrap();
        let order: Vec<&str> = graph.indices().map(|ix| graph.id(ix).as_str()).collect();
        assert_eq!(order, vec!["alpha", "mid", "zeta"]);
        assert_eq!(ids(graph.predecessors("mid")), vec!["alpha", "zeta"]);
    }

    #[test]
    fn rejects_self_loop() {
        let err = ConceptGraph::build(vec![concept("a", &["a"])]).unwrap_err();
        assert!(matches!(err, GraphError::Build(msg) if msg.contains("itself")));
    }

    #[test]
    fn rejects_empty_id_and_duplicates() {
        let err = ConceptGraph::build(vec![concept("  ", &[])]).unwrap_err();
        assert!(matches!(err, GraphError::Build(_)));

        let err = ConceptGraph::build(vec![concept("a", &[]), concept("a", &[])]).unwrap_err();
        assert!(matches!(err, GraphError::Build(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn rejects_out_of_range_complexity_and_hours() {
        let err = ConceptGraph::build(vec![Concept::new("a", "A").with_complexity(0)]).unwrap_err();
        assert!(matches!(err, GraphError::Build(msg) if msg.contains("complexity")));

        let err = ConceptGraph::build(vec![Concept::new("a", "A").with_hours(-1.0)]).unwrap_err();
        assert!(matches!(err, GraphError::Build(msg) if msg.contains("hours")));
    }

    #[test]
    fn detects_cycle_and_names_its_nodes() {
        let err = ConceptGraph::build(vec![
            concept("root", &[]),
            concept("a", &["root", "c"]),
            concept("b", &["a"]),
            concept("c", &["b"]),
        ])
        .unwrap_err();

        match err {
            GraphError::Cycle { cycle } => {
                assert_eq!(ids(&cycle), vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let err = ConceptGraph::build(vec![concept("x", &["y"]), concept("y", &["x"])]).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { cycle } if cycle.len() == 2));
    }

    #[test]
    fn acyclic_diamond_validates() {
        let graph = ConceptGraph::build(vec![
            concept("a", &[]),
            concept("b", &["a"]),
            concept("c", &["a"]),
            concept("d", &["b", "c"]),
        ])
        .unwrap();
        assert!(validate_acyclic(&graph).is_ok());
        assert_eq!(graph.roots(), vec![graph.node_index("a").unwrap()]);
    }

    #[test]
    fn topological_order_is_deterministic() {
        let graph = ConceptGraph::build(vec![
            concept("d", &["b", "c"]),
            concept("c", &["a"]),
            concept("b", &["a"]),
            concept("a", &[]),
            concept("e", &[]),
        ])
        .unwrap();
        let order: Vec<&str> = graph
            .topological_order()
            .into_iter()
            .map(|ix| graph.id(ix).as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn prerequisite_closure_is_transitive_and_ordered() {
        let graph = ConceptGraph::build(vec![
            concept("variables", &[]),
            concept("conditionals", &["variables"]),
            concept("loops", &["conditionals"]),
            concept("arrays", &["variables", "loops"]),
            concept("unrelated", &[]),
        ])
        .unwrap();

        let closure = graph.prerequisite_closure("arrays").unwrap();
        assert_eq!(ids(closure), vec!["variables", "conditionals", "loops"]);
        assert!(graph.prerequisite_closure("variables").unwrap().is_empty());
        assert!(graph.prerequisite_closure("nope").is_none());
    }
}
