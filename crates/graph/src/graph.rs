//! Live expression graph
//!
//! Owns the universe and the ordered list of nodes that are part of the model:
//! inputs first, then every accepted node preceded by whatever it depends on.
//! Yield points are the nodes whose outputs are voted on.

use crate::errors::{GraphError, Result};
use crate::instance_cache::InstanceCache;
use crate::samples_cache::SamplesCache;
use crate::universe::{NodeId, Universe};
use crate::value::{Value, ValueType};
use rustc_hash::FxHashMap;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct Graph {
    universe: Universe,
    inputs: Vec<NodeId>,
    input_names: Vec<String>,
    nodes: Vec<NodeId>,
    /// Position of each live node in `nodes`
    positions: FxHashMap<NodeId, usize>,
    yields: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next input column.
    pub fn add_input(&mut self, name: impl Into<String>, ty: ValueType) -> NodeId {
        let index = self.inputs.len() as u32;
        let id = self.universe.input(index, ty);
        self.inputs.push(id);
        self.input_names.push(name.into());
        self.append(id);
        id
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn yields(&self) -> &[NodeId] {
        &self.yields
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Insert `id` with its dependency closure; returns how many nodes were added.
    pub fn push_node(&mut self, id: NodeId) -> Result<usize> {
        if self.contains(id) {
            return Ok(0);
        }
        let mut added = 0;
        for dependency in self.universe.dependencies(id)? {
            if self.contains(dependency) {
                continue;
            }
            if self.universe.node(dependency)?.is_input() {
                return Err(GraphError::Unreachable(dependency));
            }
            self.append(dependency);
            added += 1;
        }
        debug!(node = %id, added, total = self.nodes.len(), "pushed node into graph");
        Ok(added)
    }

    /// Push `id` and mark it as a yield point.
    pub fn add_yield(&mut self, id: NodeId) -> Result<()> {
        self.push_node(id)?;
        self.yields.push(id);
        Ok(())
    }

    fn append(&mut self, id: NodeId) {
        self.positions.insert(id, self.nodes.len());
        self.nodes.push(id);
    }

    /// Verify that every child of a live node is live and listed before it.
    pub fn check_invariants(&self) -> Result<()> {
        for (position, &id) in self.nodes.iter().enumerate() {
            for &child in &self.universe.node(id)?.children {
                match self.positions.get(&child) {
                    Some(&child_position) if child_position < position => {}
                    _ => {
                        return Err(GraphError::StructuralViolation(format!(
                            "{} depends on {} which is not live before it",
                            id, child
                        )))
                    }
                }
            }
        }
        for &id in &self.yields {
            if !self.contains(id) {
                return Err(GraphError::StructuralViolation(format!(
                    "yield {} is not a live node",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Samples cache over a dataset given as one column per input.
    pub fn bind_samples(&self, columns: &[Vec<Value>], max_entries: usize) -> Result<SamplesCache> {
        if columns.len() != self.inputs.len() {
            return Err(GraphError::ShapeMismatch {
                expected: self.inputs.len(),
                actual: columns.len(),
            });
        }
        let num_examples = columns.first().map(Vec::len).unwrap_or(0);
        let mut cache = SamplesCache::bind(&self.inputs, num_examples, max_entries);
        for (&input, column) in self.inputs.iter().zip(columns) {
            if column.len() != num_examples {
                return Err(GraphError::ShapeMismatch {
                    expected: num_examples,
                    actual: column.len(),
                });
            }
            cache.set_input_column(input, 0, column)?;
        }
        Ok(cache)
    }

    /// Instance cache seeded with one example (one value per input).
    pub fn instance_cache(&self, example: &[Value]) -> Result<InstanceCache<'_>> {
        let mut cache = InstanceCache::new(&self.universe);
        cache.seed_inputs(&self.inputs, example)?;
        Ok(cache)
    }

    pub fn describe(&self, id: NodeId) -> String {
        self.universe.describe(id, &self.input_names)
    }
}
