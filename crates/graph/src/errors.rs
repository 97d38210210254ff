//! Error types for the expression graph

use crate::universe::NodeId;
use thiserror::Error;

/// Errors that can occur while building or evaluating the expression graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// An operator was applied outside of its arity/type contract
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// A node id that was never registered in the universe
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// A node depends on an input that is not bound to the current cache
    #[error("Node {0} is not reachable from the bound inputs")]
    Unreachable(NodeId),

    /// Column or example length does not match the bound dataset
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A seeding operation targeted a node that is not an input
    #[error("Node {0} is not an input node")]
    NotAnInput(NodeId),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
