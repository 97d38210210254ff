use symboost_graph::GraphError;
use thiserror::Error;

/// Errors returned by the boosting trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// The search produced no candidate scoring above the configured minimum
    #[error("no weak learner found")]
    NoWeakLearnerFound,

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
