//! Samples cache - memoized node columns over a bound dataset
//!
//! Every entry holds the per-example values of one node and, on demand, a
//! sorted `(value, example)` index used by threshold scans. Input columns are
//! seeded by the caller and never evicted. Derived entries are bounded by
//! `max_entries` and evicted first-in first-out by insertion order; an evicted
//! entry is recomputed transparently from its children on the next access.

use crate::errors::{GraphError, Result};
use crate::operator::Operator;
use crate::universe::{NodeId, Universe};
use crate::value::{Column, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Ascending `(value, example index)` pairs over the non-missing examples of a
/// column. Booleans are read as 0/1; ties are ordered by example index.
pub type SortedIndex = Vec<(f64, u32)>;

/// Hit/miss/eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    values: Column,
    sorted: Option<Arc<SortedIndex>>,
    /// Insertion stamp, matched against the eviction queue
    stamp: u64,
}

pub struct SamplesCache {
    num_examples: usize,
    max_entries: usize,
    inputs: FxHashSet<NodeId>,
    entries: FxHashMap<NodeId, CacheEntry>,
    insertion_order: VecDeque<(NodeId, u64)>,
    counter: u64,
    stats: CacheStats,
}

impl SamplesCache {
    /// Fresh cache for a dataset of `num_examples` examples.
    ///
    /// Input columns start out all-missing until seeded with
    /// [`SamplesCache::set_input_column`].
    pub fn bind(inputs: &[NodeId], num_examples: usize, max_entries: usize) -> Self {
        let mut entries = FxHashMap::default();
        for &input in inputs {
            entries.insert(
                input,
                CacheEntry {
                    values: Arc::new(vec![Value::Missing; num_examples]),
                    sorted: None,
                    stamp: 0,
                },
            );
        }
        debug!(inputs = inputs.len(), num_examples, max_entries, "bound samples cache");
        Self {
            num_examples,
            max_entries,
            inputs: inputs.iter().copied().collect(),
            entries,
            insertion_order: VecDeque::new(),
            counter: 0,
            stats: CacheStats::default(),
        }
    }

    /// Drop everything and bind to another dataset.
    pub fn rebind(&mut self, inputs: &[NodeId], num_examples: usize, max_entries: usize) {
        *self = Self::bind(inputs, num_examples, max_entries);
    }

    pub fn num_examples(&self) -> usize {
        self.num_examples
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Total number of entries, inputs included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of derived (evictable) entries.
    pub fn evictable_len(&self) -> usize {
        self.entries.len() - self.inputs.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn is_bound_input(&self, node: NodeId) -> bool {
        self.inputs.contains(&node)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Write `values` into the column of `input`, starting at example `offset`.
    ///
    /// Derived entries may depend on the input, so all of them are dropped.
    pub fn set_input_column(
        &mut self,
        input: NodeId,
        offset: usize,
        values: &[Value],
    ) -> Result<()> {
        if !self.is_bound_input(input) {
            return Err(GraphError::NotAnInput(input));
        }
        let end = offset + values.len();
        if end > self.num_examples {
            return Err(GraphError::ShapeMismatch {
                expected: self.num_examples,
                actual: end,
            });
        }

        let entry = self
            .entries
            .get_mut(&input)
            .ok_or(GraphError::Unreachable(input))?;
        Arc::make_mut(&mut entry.values)[offset..end].copy_from_slice(values);
        entry.sorted = None;

        let inputs = &self.inputs;
        self.entries.retain(|id, _| inputs.contains(id));
        self.insertion_order.clear();
        trace!(%input, offset, len = values.len(), "seeded input column");
        Ok(())
    }

    /// Per-example values of `node`, plus its sorted index when `want_sorted`.
    pub fn get_or_compute(
        &mut self,
        universe: &Universe,
        node: NodeId,
        want_sorted: bool,
    ) -> Result<(Column, Option<Arc<SortedIndex>>)> {
        let values = self.column(universe, node)?;
        if !want_sorted {
            return Ok((values, None));
        }

        if let Some(sorted) = self.entries.get(&node).and_then(|entry| entry.sorted.clone()) {
            return Ok((values, Some(sorted)));
        }

        let sorted = Arc::new(build_sorted_index(&values));
        if let Some(entry) = self.entries.get_mut(&node) {
            entry.sorted = Some(sorted.clone());
        }
        Ok((values, Some(sorted)))
    }

    /// Per-example values of `node`.
    pub fn column(&mut self, universe: &Universe, node: NodeId) -> Result<Column> {
        if let Some(entry) = self.entries.get(&node) {
            self.stats.hits += 1;
            return Ok(entry.values.clone());
        }

        let record = universe.node(node)?;
        if record.is_input() {
            return Err(GraphError::Unreachable(node));
        }
        self.stats.misses += 1;

        let mut children: SmallVec<[Column; 2]> = SmallVec::with_capacity(record.children.len());
        for &child in &record.children {
            children.push(self.column(universe, child)?);
        }

        let values: Column = Arc::new(evaluate_column(&record.op, &children, self.num_examples));
        self.insert(node, values.clone());
        Ok(values)
    }

    /// Remove the entry of a derived node; inputs are kept.
    pub fn invalidate(&mut self, node: NodeId) -> bool {
        if self.is_bound_input(node) {
            return false;
        }
        let removed = self.entries.remove(&node).is_some();
        if self.insertion_order.len() > 2 * self.evictable_len() {
            self.compact_order();
        }
        removed
    }

    /// Drop order records whose entry is gone or was re-inserted since.
    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.insertion_order
            .retain(|(node, stamp)| entries.get(node).map(|entry| entry.stamp) == Some(*stamp));
    }

    fn insert(&mut self, node: NodeId, values: Column) {
        if self.max_entries == 0 {
            return;
        }
        while self.evictable_len() >= self.max_entries {
            if !self.evict_oldest() {
                break;
            }
        }

        self.counter += 1;
        let stamp = self.counter;
        self.entries.insert(
            node,
            CacheEntry {
                values,
                sorted: None,
                stamp,
            },
        );
        self.insertion_order.push_back((node, stamp));
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((node, stamp)) = self.insertion_order.pop_front() {
            // Stale records belong to entries that were invalidated or re-inserted.
            let current = self.entries.get(&node).map(|entry| entry.stamp);
            if current == Some(stamp) {
                self.entries.remove(&node);
                self.stats.evictions += 1;
                debug!(%node, remaining = self.evictable_len(), "evicted samples cache entry");
                return true;
            }
        }
        false
    }
}

/// Apply `op` element-wise over the children's columns.
pub fn evaluate_column(op: &Operator, children: &[Column], num_examples: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(num_examples);
    let mut args: SmallVec<[Value; 2]> = SmallVec::with_capacity(children.len());
    for example in 0..num_examples {
        args.clear();
        args.extend(children.iter().map(|column| column[example]));
        out.push(op.apply(&args));
    }
    out
}

pub fn build_sorted_index(values: &[Value]) -> SortedIndex {
    let mut index: SortedIndex = values
        .iter()
        .enumerate()
        .filter_map(|(example, value)| value.as_ordinal().map(|x| (x, example as u32)))
        .collect();
    index.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    index
}
