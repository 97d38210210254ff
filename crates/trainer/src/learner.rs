//! Boosting learner
//!
//! Discrete AdaBoost where every weak learner is an expression found by the
//! search over the live graph's universe. Each iteration runs through the
//! phases of [`Phase`]; the samples caches of the training and validation sets
//! persist across iterations, so accepting a node only costs the evaluation of
//! that node's column.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use symboost_graph::{Graph, NodeId, PrimitiveSet, SamplesCache, SharedUniverse, ValueType};
use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::dataset::Dataset;
use crate::deterministic::{exceeds, CandidateRank};
use crate::errors::{Result, TrainerError};
use crate::model::BoostedModel;
use crate::objective::{Metric, SplitObjective, SplitStats};
use crate::search::SearchSpace;
use crate::stump::find_best_threshold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    WeakLearning,
    StumpCreation,
    GraphInsertion,
    PredictionUpdate,
    Evaluation,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    NoWeakLearnerFound,
    PerfectFit,
    EarlyStopped,
    Interrupted,
}

/// Per-iteration outcome reported for logging and monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: usize,
    /// The accepted yield node
    pub node: NodeId,
    pub description: String,
    pub threshold: Option<f64>,
    pub vote: f64,
    pub score: f64,
    pub stats: SplitStats,
    pub candidates: usize,
    pub train_metric: f64,
    pub valid_metric: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub metric: String,
    pub iterations: Vec<IterationReport>,
    pub stop_reason: Option<StopReason>,
}

impl TrainingHistory {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn last(&self) -> Option<&IterationReport> {
        self.iterations.last()
    }
}

/// A dataset bound to the graph: its samples cache, labels and the running
/// prediction vector `F(x)`.
struct BoundSet {
    cache: SamplesCache,
    labels: Vec<bool>,
    predictions: Vec<f64>,
}

impl BoundSet {
    fn bind(graph: &Graph, dataset: &Dataset, max_entries: usize) -> Result<Self> {
        let cache = graph.bind_samples(&dataset.columns, max_entries)?;
        Ok(Self {
            cache,
            labels: dataset.labels.clone(),
            predictions: vec![0.0; dataset.len()],
        })
    }

    /// `F(x) += vote · h(x)` using the cached column of `node`.
    fn apply_vote(&mut self, graph: &Graph, node: NodeId, vote: f64) -> Result<()> {
        let column = self.cache.column(graph.universe(), node)?;
        for (prediction, value) in self.predictions.iter_mut().zip(column.iter()) {
            match value.as_bool() {
                Some(true) => *prediction += vote,
                Some(false) => *prediction -= vote,
                None => {}
            }
        }
        Ok(())
    }
}

/// Scored candidate from the weak-learning phase.
struct WeakLearner {
    candidate: NodeId,
    threshold: Option<f64>,
    stats: SplitStats,
    score: f64,
}

pub struct BoostingLearner {
    config: TrainerConfig,
    primitives: PrimitiveSet,
    objective: Box<dyn SplitObjective>,
    metric: Box<dyn Metric>,
    graph: Graph,
    votes: Vec<f64>,
    train: BoundSet,
    valid: Option<BoundSet>,
    phase: Phase,
    history: TrainingHistory,
    stop: Arc<AtomicBool>,
    best_metric: Option<f64>,
    stale_iterations: usize,
}

impl BoostingLearner {
    pub fn new(config: TrainerConfig, train: &Dataset, valid: Option<&Dataset>) -> Result<Self> {
        config.validate()?;
        if train.is_empty() {
            return Err(TrainerError::Dataset("training set is empty".to_string()));
        }
        if let Some(valid) = valid {
            if !train.same_schema(valid) {
                return Err(TrainerError::Dataset(
                    "validation set columns differ from the training set".to_string(),
                ));
            }
        }

        let primitives = config.primitive_set()?;
        let mut graph = Graph::new();
        for (name, &ty) in train.names.iter().zip(&train.types) {
            graph.add_input(name.clone(), ty);
        }

        let max_entries = config.cache.max_entries;
        let train_set = BoundSet::bind(&graph, train, max_entries)?;
        let valid_set = valid
            .map(|valid| BoundSet::bind(&graph, valid, max_entries))
            .transpose()?;

        let objective = config.boosting.objective.build();
        let metric = config.boosting.metric.build();
        info!(
            examples = train.len(),
            inputs = graph.inputs().len(),
            validation = valid.map(Dataset::len).unwrap_or(0),
            primitives = ?primitives.names(),
            objective = objective.name(),
            metric = metric.name(),
            "boosting learner ready"
        );

        Ok(Self {
            history: TrainingHistory {
                metric: metric.name().to_string(),
                ..TrainingHistory::default()
            },
            config,
            primitives,
            objective,
            metric,
            graph,
            votes: Vec::new(),
            train: train_set,
            valid: valid_set,
            phase: Phase::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            best_metric: None,
            stale_iterations: 0,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn votes(&self) -> &[f64] {
        &self.votes
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn train_predictions(&self) -> &[f64] {
        &self.train.predictions
    }

    pub fn valid_predictions(&self) -> Option<&[f64]> {
        self.valid.as_ref().map(|set| set.predictions.as_slice())
    }

    /// Setting the returned flag stops training before the next iteration.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Snapshot of the model trained so far.
    pub fn model(&self) -> BoostedModel {
        BoostedModel::new(self.graph.clone(), self.votes.clone())
    }

    pub fn into_model(self) -> BoostedModel {
        BoostedModel::new(self.graph, self.votes)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(iteration = self.votes.len() + 1, phase = ?phase, "entering phase");
        self.phase = phase;
    }

    /// AdaBoost example weights `exp(−y·F(x))`, normalized to sum to one.
    pub fn example_weights(&self) -> Vec<f64> {
        let mut weights: Vec<f64> = self
            .train
            .predictions
            .iter()
            .zip(&self.train.labels)
            .map(|(&score, &label)| {
                let margin = if label { score } else { -score };
                (-margin).exp()
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total > 0.0 && total.is_finite() {
            for weight in &mut weights {
                *weight /= total;
            }
        } else {
            let uniform = 1.0 / weights.len().max(1) as f64;
            weights.iter_mut().for_each(|weight| *weight = uniform);
        }
        weights
    }

    /// All candidates of the configured search, in ascending id order.
    fn search_candidates(&mut self) -> Result<Vec<NodeId>> {
        let inputs = self.graph.inputs().to_vec();
        let space = SearchSpace::new(&inputs, &self.primitives, &self.config.search);
        debug!(
            max_depth = self.config.search.max_depth,
            max_steps = space.max_steps(),
            parallel = self.config.search.parallel,
            "searching weak learners"
        );

        let mut candidates = if self.config.search.parallel {
            let shared = SharedUniverse::new(std::mem::take(self.graph.universe_mut()));
            let result = space.enumerate_parallel(&shared);
            *self.graph.universe_mut() = shared.into_inner();
            result?
        } else {
            space
                .candidates(self.graph.universe_mut())
                .collect::<symboost_graph::Result<Vec<_>>>()?
        };
        candidates.sort_unstable();
        Ok(candidates)
    }

    /// Score one candidate on the training set; continuous candidates get
    /// their best threshold.
    fn score_candidate(
        &mut self,
        candidate: NodeId,
        weights: &[f64],
    ) -> Result<Option<WeakLearner>> {
        let universe = self.graph.universe();
        let ty = universe.node(candidate)?.ty;
        match ty {
            ValueType::Boolean => {
                let column = self.train.cache.column(universe, candidate)?;
                let stats = SplitStats::from_decisions(&column, &self.train.labels, weights);
                Ok(Some(WeakLearner {
                    candidate,
                    threshold: None,
                    stats,
                    score: self.objective.score(&stats),
                }))
            }
            ValueType::Double => {
                let (_, sorted) = self.train.cache.get_or_compute(universe, candidate, true)?;
                let Some(sorted) = sorted else {
                    return Ok(None);
                };
                let objective = self.objective.as_ref();
                let choice = find_best_threshold(&sorted, &self.train.labels, weights, objective);
                Ok(choice.map(|choice| WeakLearner {
                    candidate,
                    threshold: Some(choice.threshold),
                    stats: choice.stats,
                    score: choice.score,
                }))
            }
        }
    }

    fn select_weak_learner(&mut self) -> Result<(WeakLearner, usize)> {
        let candidates = self.search_candidates()?;
        let weights = self.example_weights();

        let mut best: Option<WeakLearner> = None;
        for &candidate in &candidates {
            let Some(scored) = self.score_candidate(candidate, &weights)? else {
                continue;
            };
            let rank = CandidateRank::new(scored.score, scored.candidate);
            let better = match &best {
                None => true,
                Some(current) => {
                    rank.outranks(&CandidateRank::new(current.score, current.candidate))
                }
            };
            if better {
                best = Some(scored);
            }
        }

        match best {
            Some(best) if self.accepts(&best) => Ok((best, candidates.len())),
            _ => Err(TrainerError::NoWeakLearnerFound),
        }
    }

    /// A weak learner must beat chance under the objective by more than
    /// `min_score`, and its vote must not vanish.
    fn accepts(&self, weak: &WeakLearner) -> bool {
        let bar = self.objective.baseline() + self.config.boosting.min_score;
        exceeds(weak.score, bar) && exceeds(weak.stats.edge().abs(), 0.0)
    }

    /// Run one boosting iteration.
    ///
    /// Fails with [`TrainerError::NoWeakLearnerFound`] when no candidate scores
    /// above the configured minimum; the model is left unchanged in that case.
    pub fn iterate(&mut self) -> Result<IterationReport> {
        self.enter(Phase::WeakLearning);
        let (weak, candidate_count) = match self.select_weak_learner() {
            Ok(selected) => selected,
            Err(err) => {
                self.phase = Phase::Idle;
                return Err(err);
            }
        };

        self.enter(Phase::StumpCreation);
        let node = match weak.threshold {
            Some(threshold) => self.graph.universe_mut().stump(weak.candidate, threshold)?,
            None => weak.candidate,
        };

        self.enter(Phase::GraphInsertion);
        self.graph.add_yield(node)?;

        self.enter(Phase::PredictionUpdate);
        let smoothing = self.config.boosting.vote_smoothing;
        let odds = (weak.stats.correct + smoothing) / (weak.stats.incorrect + smoothing);
        let vote = 0.5 * odds.ln();
        self.votes.push(vote);
        self.train.apply_vote(&self.graph, node, vote)?;
        if let Some(valid) = self.valid.as_mut() {
            valid.apply_vote(&self.graph, node, vote)?;
        }

        self.enter(Phase::Evaluation);
        let train_metric = self.metric.evaluate(&self.train.predictions, &self.train.labels);
        let valid_metric = self
            .valid
            .as_ref()
            .map(|valid| self.metric.evaluate(&valid.predictions, &valid.labels));

        let report = IterationReport {
            iteration: self.votes.len(),
            node,
            description: self.graph.describe(node),
            threshold: weak.threshold,
            vote,
            score: weak.score,
            stats: weak.stats,
            candidates: candidate_count,
            train_metric,
            valid_metric,
        };
        info!(
            iteration = report.iteration,
            weak = %report.description,
            vote = report.vote,
            candidates = report.candidates,
            train = report.train_metric,
            valid = ?report.valid_metric,
            cache_hits = self.train.cache.stats().hits,
            cache_entries = self.train.cache.evictable_len(),
            cache_capacity = self.train.cache.max_entries(),
            "boosting iteration"
        );
        self.history.iterations.push(report.clone());
        self.phase = Phase::Idle;
        Ok(report)
    }

    fn should_stop(&mut self, report: &IterationReport) -> Option<StopReason> {
        let boosting = &self.config.boosting;
        if boosting.stop_on_perfect && self.metric.is_perfect(report.train_metric) {
            return Some(StopReason::PerfectFit);
        }

        let monitored = report.valid_metric.unwrap_or(report.train_metric);
        match self.best_metric {
            Some(best) if !self.metric.improves(monitored, best) => self.stale_iterations += 1,
            _ => {
                self.best_metric = Some(monitored);
                self.stale_iterations = 0;
            }
        }
        if boosting.patience > 0 && self.stale_iterations >= boosting.patience {
            return Some(StopReason::EarlyStopped);
        }

        if report.iteration >= boosting.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        None
    }

    /// Boost until a stopping criterion fires.
    ///
    /// Running out of weak learners ends training normally; the model trained
    /// so far is kept.
    pub fn train(&mut self) -> Result<StopReason> {
        let reason = loop {
            if self.stop.load(Ordering::Relaxed) {
                break StopReason::Interrupted;
            }
            if self.votes.len() >= self.config.boosting.max_iterations {
                break StopReason::MaxIterations;
            }
            match self.iterate() {
                Ok(report) => {
                    if let Some(reason) = self.should_stop(&report) {
                        break reason;
                    }
                }
                Err(TrainerError::NoWeakLearnerFound) => break StopReason::NoWeakLearnerFound,
                Err(err) => return Err(err),
            }
        };

        self.phase = Phase::Stopped;
        self.history.stop_reason = Some(reason);
        info!(
            reason = ?reason,
            iterations = self.votes.len(),
            graph_nodes = self.graph.nodes().len(),
            universe_nodes = self.graph.universe().len(),
            "training stopped"
        );
        Ok(reason)
    }
}
