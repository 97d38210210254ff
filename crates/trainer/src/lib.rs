//! Symboost trainer
//!
//! Boosting over symbolic weak learners: each iteration searches the space of
//! small typed expressions over the input columns, turns the best one into a
//! boolean decision and adds it to the live expression graph with a vote.

pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod learner;
pub mod model;
pub mod objective;
pub mod report;
pub mod search;
pub mod stump;

pub use config::{BoostingConfig, CacheConfig, TrainerConfig};
pub use dataset::Dataset;
pub use deterministic::CandidateRank;
pub use errors::{Result, TrainerError};
pub use learner::{BoostingLearner, IterationReport, Phase, StopReason, TrainingHistory};
pub use model::{BoostedModel, ModelTerm};
pub use objective::{
    AbsoluteEdge, Accuracy, ErrorRate, ExponentialLoss, Metric, MetricKind, ObjectiveKind,
    SplitObjective, SplitStats, WeightedAccuracy,
};
pub use report::TrainingReport;
pub use search::{Action, Candidates, SearchConfig, SearchSpace, SearchState, StateKind, Transition};
pub use stump::{find_best_threshold, ThresholdChoice};

/// Train on a CSV file and return the model with its history.
pub fn train_from_csv(
    path: &std::path::Path,
    config: TrainerConfig,
) -> Result<(BoostedModel, TrainingHistory)> {
    let dataset = Dataset::from_csv(path)?;
    let mut learner = BoostingLearner::new(config, &dataset, None)?;
    learner.train()?;
    let history = learner.history().clone();
    Ok((learner.into_model(), history))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
