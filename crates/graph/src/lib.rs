//! Symboost expression graph
//!
//! Structurally shared expression nodes evaluated over datasets with
//! memoization:
//!
//! - `universe`: arena of immutable nodes with hash-consing
//! - `operator`: closed set of operator kinds and their evaluation
//! - `graph`: live node list with dependency closure and yield points
//! - `instance_cache`: per-example memoization for prediction
//! - `samples_cache`: per-dataset column memoization with bounded FIFO eviction
//! - `primitives`: function sets offered to the weak-learner search

pub mod errors;
pub mod graph;
pub mod instance_cache;
pub mod operator;
pub mod primitives;
pub mod samples_cache;
pub mod universe;
pub mod value;

pub use errors::{GraphError, Result};
pub use graph::Graph;
pub use instance_cache::InstanceCache;
pub use operator::Operator;
pub use primitives::PrimitiveSet;
pub use samples_cache::{CacheStats, SamplesCache, SortedIndex};
pub use universe::{Node, NodeFactory, NodeHeader, NodeId, SharedUniverse, Universe};
pub use value::{Column, Value, ValueType};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
