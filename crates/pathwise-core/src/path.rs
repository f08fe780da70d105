//! Learning-path search over the prerequisite graph.
//!
//! [`shortest_path`] is Dijkstra from a virtual start joined to every frontier
//! concept. Labels are ordered by (cost, number of concepts, id sequence), so
//! ties resolve the same way on every run. [`all_paths`] enumerates simple
//! paths for presenting alternatives.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::graph::{ConceptGraph, NodeIndex};
use crate::model::ConceptId;

/// Default lower bound on a mastery-weighted edge.
pub const DEFAULT_MIN_EDGE_COST: f64 = 0.01;

/// How the cost of entering a concept is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostPolicy {
    /// Every edge costs 1 (hop count).
    Uniform,
    /// cost(u→v) = complexity(v).
    Complexity,
    /// cost(u→v) = complexity(v) · (1 − mastery(v)), floored at the minimum edge cost.
    #[default]
    MasteryWeighted,
}

impl std::fmt::Display for CostPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostPolicy::Uniform => write!(f, "uniform"),
            CostPolicy::Complexity => write!(f, "complexity"),
            CostPolicy::MasteryWeighted => write!(f, "mastery-weighted"),
        }
    }
}

impl std::str::FromStr for CostPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "uniform" | "hops" => Ok(CostPolicy::Uniform),
            "complexity" => Ok(CostPolicy::Complexity),
            "mastery-weighted" | "mastery" => Ok(CostPolicy::MasteryWeighted),
            other => Err(format!("unknown cost policy: {other}")),
        }
    }
}

/// Source of per-concept mastery scores for weighted costs.
pub trait MasteryLookup {
    /// Mastery in [0, 1]; concepts without a record are 0.
    fn mastery_of(&self, concept: &ConceptId) -> f64;
}

impl MasteryLookup for HashMap<ConceptId, f64> {
    fn mastery_of(&self, concept: &ConceptId) -> f64 {
        self.get(concept).copied().unwrap_or(0.0)
    }
}

/// Edge pricing used by the search.
#[derive(Clone, Copy)]
pub struct CostModel<'a> {
    policy: CostPolicy,
    min_edge_cost: f64,
    mastery: Option<&'a dyn MasteryLookup>,
}

impl<'a> CostModel<'a> {
    pub fn new(
        policy: CostPolicy,
        min_edge_cost: f64,
        mastery: Option<&'a dyn MasteryLookup>,
    ) -> Self {
        let min_edge_cost = if min_edge_cost > 0.0 {
            min_edge_cost
        } else {
            DEFAULT_MIN_EDGE_COST
        };
        Self {
            policy,
            min_edge_cost,
            mastery,
        }
    }

    pub fn uniform() -> Self {
        Self::new(CostPolicy::Uniform, DEFAULT_MIN_EDGE_COST, None)
    }

    pub fn complexity() -> Self {
        Self::new(CostPolicy::Complexity, DEFAULT_MIN_EDGE_COST, None)
    }

    pub fn mastery_weighted(mastery: &'a dyn MasteryLookup, min_edge_cost: f64) -> Self {
        Self::new(CostPolicy::MasteryWeighted, min_edge_cost, Some(mastery))
    }

    pub fn policy(&self) -> CostPolicy {
        self.policy
    }

    /// Cost of any edge entering `to`.
    pub fn edge_cost(&self, graph: &ConceptGraph, to: NodeIndex) -> f64 {
        let complexity = f64::from(graph.concept_at(to).complexity);
        match self.policy {
            CostPolicy::Uniform => 1.0,
            CostPolicy::Complexity => complexity,
            CostPolicy::MasteryWeighted => {
                let mastery = self
                    .mastery
                    .map(|m| m.mastery_of(graph.id(to)).clamp(0.0, 1.0))
                    .unwrap_or(0.0);
                (complexity * (1.0 - mastery)).max(self.min_edge_cost)
            }
        }
    }
}

impl std::fmt::Debug for CostModel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostModel")
            .field("policy", &self.policy)
            .field("min_edge_cost", &self.min_edge_cost)
            .field("has_mastery", &self.mastery.is_some())
            .finish()
    }
}

/// An ordered sequence of concepts ending at a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    /// Already-mastered concept the path leaves from; `None` when the path
    /// enters the graph at a root concept.
    pub start: Option<ConceptId>,
    /// Concepts to study, in order; the goal is last.
    pub concepts: Vec<ConceptId>,
    /// Cost of the edge entering each concept, parallel to `concepts`.
    pub edge_costs: Vec<f64>,
    /// Sum of `edge_costs`.
    pub total_cost: f64,
}

impl LearningPath {
    fn from_nodes(
        graph: &ConceptGraph,
        start: Option<NodeIndex>,
        concepts: &[NodeIndex],
        cost: &CostModel<'_>,
    ) -> Self {
        let edge_costs: Vec<f64> = concepts.iter().map(|&ix| cost.edge_cost(graph, ix)).collect();
        let total_cost = edge_costs.iter().sum();
        Self {
            start: start.map(|ix| graph.id(ix).clone()),
            concepts: concepts.iter().map(|&ix| graph.id(ix).clone()).collect(),
            edge_costs,
            total_cost,
        }
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Total order used to rank paths: cost, then length, then ids.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.total_cost
            .total_cmp(&other.total_cost)
            .then_with(|| self.concepts.len().cmp(&other.concepts.len()))
            .then_with(|| {
                self.start
                    .iter()
                    .chain(&self.concepts)
                    .cmp(other.start.iter().chain(&other.concepts))
            })
    }
}

/// Search state for one tentative path.
#[derive(Debug, Clone)]
struct Label {
    cost: f64,
    /// Concepts on the path, excluding a frontier start.
    hops: usize,
    /// Every node from the start through `node`.
    seq: Vec<NodeIndex>,
}

impl Label {
    fn node(&self) -> NodeIndex {
        // seq is never empty: every label starts with one node.
        self.seq[self.seq.len() - 1]
    }

    fn rank(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.hops.cmp(&other.hops))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    // Reversed: BinaryHeap is a max-heap and we want the cheapest label first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank(self)
    }
}

/// Minimum-cost path from the learner's frontier to `goal`, goal included.
///
/// Frontier concepts are treated as simultaneous zero-cost sources and are
/// not part of the returned `concepts`. With an empty frontier the search
/// starts at every root concept instead, and the root is part of the path.
pub fn shortest_path(
    graph: &ConceptGraph,
    frontier: &[ConceptId],
    goal: &ConceptId,
    cost: &CostModel<'_>,
) -> Result<LearningPath, PathError> {
    let goal_ix = graph
        .node_index(goal.as_str())
        .ok_or_else(|| PathError::UnknownConcept(goal.clone()))?;

    let mut sources = Vec::with_capacity(frontier.len());
    for id in frontier {
        let ix = graph
            .node_index(id.as_str())
            .ok_or_else(|| PathError::UnknownConcept(id.clone()))?;
        sources.push(ix);
    }
    sources.sort();
    sources.dedup();

    if sources.binary_search(&goal_ix).is_ok() {
        tracing::debug!(goal = %goal, "goal already in frontier");
        return Ok(LearningPath {
            start: Some(goal.clone()),
            concepts: vec![goal.clone()],
            edge_costs: vec![0.0],
            total_cost: 0.0,
        });
    }

    let mut heap = BinaryHeap::new();
    let mut tentative: Vec<Option<Label>> = vec![None; graph.len()];
    let mut settled = vec![false; graph.len()];

    let from_frontier = !sources.is_empty();
    if from_frontier {
        for &ix in &sources {
            let label = Label {
                cost: 0.0,
                hops: 0,
                seq: vec![ix],
            };
            tentative[ix.index()] = Some(label.clone());
            heap.push(label);
        }
    } else {
        for ix in graph.roots() {
            let label = Label {
                cost: cost.edge_cost(graph, ix),
                hops: 1,
                seq: vec![ix],
            };
            tentative[ix.index()] = Some(label.clone());
            heap.push(label);
        }
    }

    while let Some(label) = heap.pop() {
        let node = label.node();
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;

        if node == goal_ix {
            let (start, concepts) = if from_frontier {
                (Some(label.seq[0]), &label.seq[1..])
            } else {
                (None, &label.seq[..])
            };
            let path = LearningPath::from_nodes(graph, start, concepts, cost);
            tracing::debug!(
                goal = %goal,
                concepts = path.len(),
                total_cost = path.total_cost,
                "found learning path"
            );
            return Ok(path);
        }

        for &next in graph.successors_of(node) {
            if settled[next.index()] {
                continue;
            }
            let mut seq = label.seq.clone();
            seq.push(next);
            let candidate = Label {
                cost: label.cost + cost.edge_cost(graph, next),
                hops: label.hops + 1,
                seq,
            };
            let improves = tentative[next.index()]
                .as_ref()
                .map_or(true, |current| candidate.rank(current) == Ordering::Less);
            if improves {
                tentative[next.index()] = Some(candidate.clone());
                heap.push(candidate);
            }
        }
    }

    Err(PathError::NoPathFound { goal: goal.clone() })
}

/// Enumerate up to `limit` simple paths from `start` to `goal`, both included.
///
/// Only nodes that can still reach the goal are expanded, so the work is
/// bounded by `limit` times the longest path. Paths come out in DFS order with
/// smaller ids explored first.
pub fn all_paths(
    graph: &ConceptGraph,
    start: &ConceptId,
    goal: &ConceptId,
    limit: usize,
) -> Result<Vec<Vec<ConceptId>>, PathError> {
    all_paths_avoiding(graph, start, goal, &[], limit)
}

/// Like [`all_paths`], but never steps onto a concept in `avoid`. The start
/// itself may be listed there.
///
/// Pruning happens during the search, so `limit` only counts paths that are
/// actually returned.
pub fn all_paths_avoiding(
    graph: &ConceptGraph,
    start: &ConceptId,
    goal: &ConceptId,
    avoid: &[ConceptId],
    limit: usize,
) -> Result<Vec<Vec<ConceptId>>, PathError> {
    let start_ix = graph
        .node_index(start.as_str())
        .ok_or_else(|| PathError::UnknownConcept(start.clone()))?;
    let goal_ix = graph
        .node_index(goal.as_str())
        .ok_or_else(|| PathError::UnknownConcept(goal.clone()))?;

    let mut results = Vec::new();
    if limit == 0 {
        return Ok(results);
    }

    let mut open = graph.ancestors(goal_ix);
    if !open[start_ix.index()] {
        return Ok(results);
    }
    for id in avoid {
        let ix = graph
            .node_index(id.as_str())
            .ok_or_else(|| PathError::UnknownConcept(id.clone()))?;
        open[ix.index()] = false;
    }

    // The graph is acyclic, so every walk is already a simple path.
    let mut stack: Vec<Vec<NodeIndex>> = vec![vec![start_ix]];
    while let Some(path) = stack.pop() {
        let node = path[path.len() - 1];
        if node == goal_ix {
            results.push(path.iter().map(|&ix| graph.id(ix).clone()).collect());
            if results.len() >= limit {
                break;
            }
            continue;
        }
        for &next in graph.successors_of(node).iter().rev() {
            if open[next.index()] {
                let mut extended = path.clone();
                extended.push(next);
                stack.push(extended);
            }
        }
    }

    Ok(results)
}

/// Price an explicit path. `start` (if any) is treated as already known.
pub fn path_cost(
    graph: &ConceptGraph,
    start: Option<&ConceptId>,
    concepts: &[ConceptId],
    cost: &CostModel<'_>,
) -> Result<LearningPath, PathError> {
    let resolve = |id: &ConceptId| {
        graph
            .node_index(id.as_str())
            .ok_or_else(|| PathError::UnknownConcept(id.clone()))
    };
    let start_ix = start.map(resolve).transpose()?;
    let nodes = concepts.iter().map(resolve).collect::<Result<Vec<_>, _>>()?;
    Ok(LearningPath::from_nodes(graph, start_ix, &nodes, cost))
}
