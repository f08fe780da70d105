//! Recommendation service.
//!
//! Answers "what should this learner do next, and how do they get to concept
//! X" by combining the cached graph, the learner's mastery snapshot and the
//! path finder. Reading never mutates mastery.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::GraphCache;
use crate::error::{MasteryError, PathError, RecommendError};
use crate::graph::ConceptGraph;
use crate::mastery::{
    retry_on_conflict, MasteryLedger, MasterySnapshot, DEFAULT_MASTERY_THRESHOLD,
};
use crate::model::{ConceptId, MasteryRecord, TopicStatus, UserId};
use crate::path::{
    all_paths_avoiding, path_cost, shortest_path, CostModel, CostPolicy, LearningPath,
    MasteryLookup, DEFAULT_MIN_EDGE_COST,
};
use crate::traits::{ConceptStore, MasteryStore};

/// Configuration for the recommendation service.
#[derive(Debug, Clone)]
pub struct RecommendConfig {
    /// Score at or above which a concept counts as mastered.
    pub mastery_threshold: f64,
    /// Edge pricing for the best-path search.
    pub cost_policy: CostPolicy,
    /// Floor for mastery-weighted edges.
    pub min_edge_cost: f64,
    /// How many alternative paths to return.
    pub max_alternatives: usize,
    /// Upper bound on simple paths enumerated while looking for alternatives.
    pub path_enumeration_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            cost_policy: CostPolicy::MasteryWeighted,
            min_edge_cost: DEFAULT_MIN_EDGE_COST,
            max_alternatives: 3,
            path_enumeration_limit: 64,
        }
    }
}

/// One concept on the recommended path, with the learner's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub concept: ConceptId,
    pub title: String,
    /// Cost of the edge entering this concept.
    pub cost: f64,
    pub score: f64,
    pub status: TopicStatus,
    /// Some prerequisite is not yet mastered.
    pub locked: bool,
}

/// Answer to a recommendation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user: UserId,
    pub goal: ConceptId,
    pub cost_policy: CostPolicy,
    pub best_path: LearningPath,
    pub steps: Vec<PathStep>,
    /// Sum of estimated learning hours along the best path.
    pub estimated_hours: f64,
    /// Other simple paths to the goal, cheapest first.
    pub alternatives: Vec<LearningPath>,
    /// Concepts that can be started right now, irrespective of the goal.
    pub ready_concepts: Vec<ConceptId>,
    /// Transitive prerequisites of the goal not yet mastered, earliest first.
    pub outstanding_prerequisites: Vec<ConceptId>,
}

/// Status of one concept for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptStatus {
    pub concept: ConceptId,
    pub title: String,
    pub score: f64,
    pub attempts: u32,
    pub status: TopicStatus,
}

/// Orchestrates catalog, graph, ledger and path search.
pub struct RecommendationService {
    catalog: Arc<dyn ConceptStore>,
    ledger: MasteryLedger,
    cache: GraphCache,
    config: RecommendConfig,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn ConceptStore>,
        mastery: Arc<dyn MasteryStore>,
        config: RecommendConfig,
    ) -> Self {
        Self::with_ledger(catalog, MasteryLedger::new(mastery), config)
    }

    pub fn with_ledger(
        catalog: Arc<dyn ConceptStore>,
        ledger: MasteryLedger,
        config: RecommendConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            cache: GraphCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    /// The graph for the current catalog version.
    pub async fn graph(&self) -> Result<Arc<ConceptGraph>, RecommendError> {
        self.cache.get_or_build(self.catalog.as_ref()).await
    }

    /// Forget the cached graph, e.g. after a catalog edit.
    pub async fn invalidate_graph(&self) {
        self.cache.invalidate().await;
    }

    /// Record a normalized quiz result for one learner.
    pub async fn submit_result(
        &self,
        user: &UserId,
        concept: &ConceptId,
        normalized_score: f64,
    ) -> Result<MasteryRecord, RecommendError> {
        let graph = self.graph().await?;
        Ok(self
            .ledger
            .record_quiz_result(user, concept, normalized_score, &graph)
            .await?)
    }

    /// Like [`Self::submit_result`], retrying up to `max_retries` times when a
    /// concurrent submission wins the compare-and-swap.
    pub async fn submit_result_with_retry(
        &self,
        user: &UserId,
        concept: &ConceptId,
        normalized_score: f64,
        max_retries: u32,
    ) -> Result<MasteryRecord, RecommendError> {
        let graph = self.graph().await?;
        let record = retry_on_conflict(max_retries, || {
            self.ledger
                .record_quiz_result(user, concept, normalized_score, &graph)
        })
        .await?;
        Ok(record)
    }

    /// Status of every catalog concept for one learner, in id order.
    pub async fn statuses(&self, user: &UserId) -> Result<Vec<ConceptStatus>, RecommendError> {
        let (graph, snapshot) = self.load(user).await?;
        let threshold = self.config.mastery_threshold;
        Ok(snapshot
            .statuses(&graph, threshold)
            .into_iter()
            .filter_map(|(id, status)| {
                let concept = graph.concept(id.as_str())?;
                Some(ConceptStatus {
                    title: concept.title.clone(),
                    score: snapshot.score_of(&id),
                    attempts: snapshot.attempts_of(&id),
                    status,
                    concept: id,
                })
            })
            .collect())
    }

    /// Best path to `goal`, alternatives, and the learner's ready set.
    pub async fn recommend(
        &self,
        user: &UserId,
        goal: &ConceptId,
    ) -> Result<Recommendation, RecommendError> {
        let (graph, snapshot) = self.load(user).await?;
        if !graph.is_catalog_concept(goal.as_str()) {
            return Err(PathError::UnknownConcept(goal.clone()).into());
        }

        let threshold = self.config.mastery_threshold;
        let cost = CostModel::new(
            self.config.cost_policy,
            self.config.min_edge_cost,
            Some(&snapshot as &dyn MasteryLookup),
        );

        let frontier = snapshot.mastered_concepts(&graph, threshold);
        tracing::debug!(
            user = %user,
            goal = %goal,
            frontier = frontier.len(),
            policy = %self.config.cost_policy,
            "computing recommendation"
        );

        let best_path = shortest_path(&graph, &frontier, goal, &cost)?;
        let alternatives = self.alternatives(&graph, &frontier, goal, &best_path, &cost)?;
        let steps = path_steps(&graph, &snapshot, &best_path, threshold)?;
        // A goal that is already mastered comes back as its own start.
        let estimated_hours: f64 = best_path
            .concepts
            .iter()
            .filter(|id| best_path.start.as_ref() != Some(*id))
            .filter_map(|id| graph.concept(id.as_str()))
            .map(|c| c.estimated_learning_hours)
            .sum();

        let mastered: HashSet<&ConceptId> = frontier.iter().collect();
        let outstanding_prerequisites = graph
            .prerequisite_closure(goal.as_str())
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !mastered.contains(id))
            .cloned()
            .collect();

        Ok(Recommendation {
            user: user.clone(),
            goal: goal.clone(),
            cost_policy: self.config.cost_policy,
            best_path,
            steps,
            estimated_hours,
            alternatives,
            ready_concepts: snapshot.ready_concepts(&graph, threshold),
            outstanding_prerequisites,
        })
    }

    async fn load(
        &self,
        user: &UserId,
    ) -> Result<(Arc<ConceptGraph>, MasterySnapshot), RecommendError> {
        futures::try_join!(self.graph(), async {
            self.ledger
                .snapshot(user)
                .await
                .map_err(RecommendError::from)
        })
    }

    /// Other simple paths from the frontier (or the roots, for a new learner)
    /// to the goal, ranked like the best path.
    ///
    /// Paths never pass through a second mastered concept: the same path
    /// starting from that concept is always cheaper. Those concepts are pruned
    /// during enumeration so they do not use up the enumeration limit.
    fn alternatives(
        &self,
        graph: &ConceptGraph,
        frontier: &[ConceptId],
        goal: &ConceptId,
        best: &LearningPath,
        cost: &CostModel<'_>,
    ) -> Result<Vec<LearningPath>, PathError> {
        if self.config.max_alternatives == 0 {
            return Ok(Vec::new());
        }

        let from_frontier = !frontier.is_empty();
        let starts: Vec<ConceptId> = if from_frontier {
            frontier.to_vec()
        } else {
            graph.roots().into_iter().map(|ix| graph.id(ix).clone()).collect()
        };

        let mut budget = self.config.path_enumeration_limit;
        let mut candidates = Vec::new();
        for start in &starts {
            if budget == 0 {
                break;
            }
            let paths = all_paths_avoiding(graph, start, goal, frontier, budget)?;
            budget -= paths.len();

            for nodes in paths {
                let candidate = if from_frontier {
                    let Some((first, rest)) = nodes.split_first() else {
                        continue;
                    };
                    if rest.is_empty() {
                        continue;
                    }
                    path_cost(graph, Some(first), rest, cost)?
                } else {
                    path_cost(graph, None, &nodes, cost)?
                };
                if candidate != *best {
                    candidates.push(candidate);
                }
            }
        }

        candidates.sort_by(|a, b| a.rank_cmp(b));
        candidates.dedup();
        candidates.truncate(self.config.max_alternatives);
        Ok(candidates)
    }
}

fn path_steps(
    graph: &ConceptGraph,
    snapshot: &MasterySnapshot,
    path: &LearningPath,
    threshold: f64,
) -> Result<Vec<PathStep>, MasteryError> {
    path.concepts
        .iter()
        .zip(&path.edge_costs)
        .map(|(id, &cost)| {
            let status = snapshot.status_of(graph, id, threshold)?;
            let locked = graph
                .predecessors(id.as_str())
                .any(|prereq| snapshot.score_of(prereq) < threshold);
            Ok(PathStep {
                concept: id.clone(),
                title: graph
                    .concept(id.as_str())
                    .map(|c| c.title.clone())
                    .unwrap_or_default(),
                cost,
                score: snapshot.score_of(id),
                status,
                locked,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Concept;
    use crate::test_support::{FixedClock, MemoryCatalog, MemoryLedgerStore};

    fn service_with(concepts: Vec<Concept>, config: RecommendConfig) -> RecommendationService {
        let catalog = Arc::new(MemoryCatalog::new(concepts));
        let ledger = MasteryLedger::new(Arc::new(MemoryLedgerStore::default()))
            .with_clock(Arc::new(FixedClock::epoch()));
        RecommendationService::with_ledger(catalog, ledger, config)
    }

    fn abc() -> Vec<Concept> {
        vec![
            Concept::new("a", "A").with_complexity(1).with_hours(1.0),
            Concept::new("b", "B")
                .with_complexity(2)
                .with_hours(2.0)
                .with_prerequisites(["a"]),
            Concept::new("c", "C")
                .with_complexity(4)
                .with_hours(3.5)
                .with_prerequisites(["b"]),
        ]
    }

    fn ids(v: &[ConceptId]) -> Vec<&str> {
        v.iter().map(ConceptId::as_str).collect()
    }

    #[tokio::test]
    async fn worked_example_recommendation() {
        let service = service_with(
            abc(),
            RecommendConfig {
                cost_policy: CostPolicy::Complexity,
                ..Default::default()
            },
        );
        let user = UserId::from("learner");

        service.submit_result(&user, &"a".into(), 0.8).await.unwrap();
        let rec = service.recommend(&user, &"c".into()).await.unwrap();

        assert_eq!(rec.best_path.start, Some("a".into()));
        assert_eq!(ids(&rec.best_path.concepts), vec!["b", "c"]);
        assert_eq!(rec.best_path.total_cost, 2.0 + 4.0);
        assert_eq!(ids(&rec.ready_concepts), vec!["b"]);
        assert_eq!(ids(&rec.outstanding_prerequisites), vec!["b"]);
        assert_eq!(rec.estimated_hours, 5.5);

        assert_eq!(rec.steps.len(), 2);
        assert_eq!(rec.steps[0].status, TopicStatus::Ready);
        assert!(!rec.steps[0].locked);
        assert_eq!(rec.steps[1].status, TopicStatus::NotStarted);
        assert!(rec.steps[1].locked);
    }

    #[tokio::test]
    async fn mastery_weighted_is_default_and_discounts_progress() {
        let service = service_with(abc(), RecommendConfig::default());
        let user = UserId::from("learner");
        service.submit_result(&user, &"a".into(), 0.8).await.unwrap();
        service.submit_result(&user, &"b".into(), 0.5).await.unwrap();

        let rec = service.recommend(&user, &"c".into()).await.unwrap();
        assert_eq!(rec.cost_policy, CostPolicy::MasteryWeighted);
        assert_eq!(ids(&rec.best_path.concepts), vec!["b", "c"]);
        assert!((rec.best_path.edge_costs[0] - 1.0).abs() < 1e-12);
        assert_eq!(rec.best_path.edge_costs[1], 4.0);
        assert_eq!(rec.steps[0].status, TopicStatus::InProgress);
    }

    #[tokio::test]
    async fn new_learner_starts_from_roots() {
        let service = service_with(abc(), RecommendConfig::default());
        let rec = service
            .recommend(&UserId::from("new"), &"c".into())
            .await
            .unwrap();
        assert_eq!(rec.best_path.start, None);
        assert_eq!(ids(&rec.best_path.concepts), vec!["a", "b", "c"]);
        assert_eq!(ids(&rec.ready_concepts), vec!["a"]);
        assert_eq!(rec.estimated_hours, 6.5);
    }

    #[tokio::test]
    async fn unreachable_goal_surfaces_no_path() {
        let service = service_with(
            vec![
                Concept::new("a", "A"),
                Concept::new("x", "X").with_prerequisites(["ghost"]),
                Concept::new("goal", "Goal").with_prerequisites(["x"]),
            ],
            RecommendConfig::default(),
        );
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 1.0).await.unwrap();

        let err = service.recommend(&user, &"goal".into()).await.unwrap_err();
        assert!(err.is_no_path());
    }

    #[tokio::test]
    async fn unknown_goal_is_rejected() {
        let service = service_with(abc(), RecommendConfig::default());
        let err = service
            .recommend(&UserId::from("u"), &"zzz".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RecommendError::Path(PathError::UnknownConcept("zzz".into()))
        );
    }

    #[tokio::test]
    async fn cyclic_catalog_aborts_request() {
        let service = service_with(
            vec![
                Concept::new("a", "A").with_prerequisites(["b"]),
                Concept::new("b", "B").with_prerequisites(["a"]),
            ],
            RecommendConfig::default(),
        );
        let err = service
            .recommend(&UserId::from("u"), &"a".into())
            .await
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn recommend_is_idempotent() {
        let service = service_with(
            vec![
                Concept::new("a", "A"),
                Concept::new("b", "B").with_prerequisites(["a"]),
                Concept::new("c", "C").with_prerequisites(["a"]),
                Concept::new("d", "D").with_prerequisites(["b", "c"]),
            ],
            RecommendConfig::default(),
        );
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 0.9).await.unwrap();

        let first = service.recommend(&user, &"d".into()).await.unwrap();
        let second = service.recommend(&user, &"d".into()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn alternatives_are_ranked_and_exclude_best() {
        //        a
        //     /  |  \
        //    b   c   e
        //     \  |  /
        //        d
        let service = service_with(
            vec![
                Concept::new("a", "A"),
                Concept::new("b", "B").with_complexity(1).with_prerequisites(["a"]),
                Concept::new("c", "C").with_complexity(2).with_prerequisites(["a"]),
                Concept::new("e", "E").with_complexity(5).with_prerequisites(["a"]),
                Concept::new("d", "D")
                    .with_complexity(1)
                    .with_prerequisites(["b", "c", "e"]),
            ],
            RecommendConfig {
                cost_policy: CostPolicy::Complexity,
                max_alternatives: 5,
                ..Default::default()
            },
        );
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 1.0).await.unwrap();

        let rec = service.recommend(&user, &"d".into()).await.unwrap();
        assert_eq!(ids(&rec.best_path.concepts), vec!["b", "d"]);

        let alts: Vec<Vec<&str>> = rec.alternatives.iter().map(|p| ids(&p.concepts)).collect();
        assert_eq!(alts, vec![vec!["c", "d"], vec!["e", "d"]]);
        assert_eq!(rec.alternatives[0].total_cost, 3.0);
        assert_eq!(rec.alternatives[1].total_cost, 6.0);
    }

    #[tokio::test]
    async fn alternatives_respect_limit() {
        let service = service_with(
            vec![
                Concept::new("a", "A"),
                Concept::new("b", "B").with_prerequisites(["a"]),
                Concept::new("c", "C").with_prerequisites(["a"]),
                Concept::new("e", "E").with_prerequisites(["a"]),
                Concept::new("d", "D").with_prerequisites(["b", "c", "e"]),
            ],
            RecommendConfig {
                max_alternatives: 1,
                ..Default::default()
            },
        );
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 1.0).await.unwrap();
        let rec = service.recommend(&user, &"d".into()).await.unwrap();
        assert_eq!(rec.alternatives.len(), 1);
    }

    #[tokio::test]
    async fn chained_mastered_concepts_leave_room_for_alternatives() {
        // a -> b -> x00..x69 -> goal, with a and b mastered. Every path from
        // a runs through b, so only the paths leaving b are worth listing.
        let xs: Vec<String> = (0..70).map(|i| format!("x{i:02}")).collect();
        let mut concepts = vec![
            Concept::new("a", "A"),
            Concept::new("b", "B").with_prerequisites(["a"]),
        ];
        concepts.extend(
            xs.iter()
                .map(|x| Concept::new(x.as_str(), x.as_str()).with_prerequisites(["b"])),
        );
        concepts.push(
            Concept::new("goal", "Goal").with_prerequisites(xs.iter().map(String::as_str)),
        );

        let service = service_with(concepts, RecommendConfig::default());
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 1.0).await.unwrap();
        service.submit_result(&user, &"b".into(), 1.0).await.unwrap();

        let rec = service.recommend(&user, &"goal".into()).await.unwrap();
        assert_eq!(rec.best_path.start, Some("b".into()));
        assert_eq!(ids(&rec.best_path.concepts), vec!["x00", "goal"]);

        let alts: Vec<(Option<&str>, Vec<&str>)> = rec
            .alternatives
            .iter()
            .map(|p| (p.start.as_ref().map(ConceptId::as_str), ids(&p.concepts)))
            .collect();
        assert_eq!(
            alts,
            vec![
                (Some("b"), vec!["x01", "goal"]),
                (Some("b"), vec!["x02", "goal"]),
                (Some("b"), vec!["x03", "goal"]),
            ]
        );
    }

    #[tokio::test]
    async fn statuses_cover_every_catalog_concept() {
        let service = service_with(abc(), RecommendConfig::default());
        let user = UserId::from("u");
        service.submit_result(&user, &"a".into(), 0.9).await.unwrap();
        service.submit_result(&user, &"b".into(), 0.1).await.unwrap();

        let statuses = service.statuses(&user).await.unwrap();
        let view: Vec<(&str, TopicStatus, u32)> = statuses
            .iter()
            .map(|s| (s.concept.as_str(), s.status, s.attempts))
            .collect();
        assert_eq!(
            view,
            vec![
                ("a", TopicStatus::Mastered, 1),
                ("b", TopicStatus::InProgress, 1),
                ("c", TopicStatus::NotStarted, 0),
            ]
        );
    }

    #[tokio::test]
    async fn submit_validates_against_catalog() {
        let service = service_with(abc(), RecommendConfig::default());
        let user = UserId::from("u");
        let err = service
            .submit_result(&user, &"nope".into(), 0.5)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RecommendError::Mastery(MasteryError::UnknownConcept("nope".into()))
        );
        let err = service
            .submit_result(&user, &"a".into(), 7.0)
            .await
            .unwrap_err();
        assert_eq!(err, RecommendError::Mastery(MasteryError::InvalidScore(7.0)));
    }
}
