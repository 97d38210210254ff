//! Per-example memoization used at prediction time.
//!
//! An [`InstanceCache`] lives for one prediction call: inputs are seeded from a
//! single example, then any node can be evaluated with at most one operator
//! application per node. No eviction.

use crate::errors::{GraphError, Result};
use crate::universe::{NodeId, Universe};
use crate::value::Value;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

pub struct InstanceCache<'u> {
    universe: &'u Universe,
    values: FxHashMap<NodeId, Value>,
    evaluations: usize,
}

impl<'u> InstanceCache<'u> {
    pub fn new(universe: &'u Universe) -> Self {
        Self {
            universe,
            values: FxHashMap::default(),
            evaluations: 0,
        }
    }

    /// Seed every input node from one example; `example[i]` feeds `inputs[i]`.
    pub fn seed_inputs(&mut self, inputs: &[NodeId], example: &[Value]) -> Result<()> {
        if inputs.len() != example.len() {
            return Err(GraphError::ShapeMismatch {
                expected: inputs.len(),
                actual: example.len(),
            });
        }
        for (&input, &value) in inputs.iter().zip(example) {
            if !self.universe.node(input)?.is_input() {
                return Err(GraphError::NotAnInput(input));
            }
            self.values.insert(input, value);
        }
        Ok(())
    }

    pub fn get(&self, node: NodeId) -> Option<Value> {
        self.values.get(&node).copied()
    }

    pub fn set(&mut self, node: NodeId, value: Value) {
        self.values.insert(node, value);
    }

    /// Value of `node`, evaluating unresolved children first.
    pub fn compute_and_memoize(&mut self, node: NodeId) -> Result<Value> {
        if let Some(value) = self.values.get(&node) {
            return Ok(*value);
        }

        let universe = self.universe;
        let record = universe.node(node)?;
        if record.is_input() {
            return Err(GraphError::Unreachable(node));
        }

        let mut args: SmallVec<[Value; 2]> = SmallVec::with_capacity(record.children.len());
        for &child in &record.children {
            args.push(self.compute_and_memoize(child)?);
        }

        let value = record.op.apply(&args);
        self.evaluations += 1;
        self.values.insert(node, value);
        Ok(value)
    }

    /// Number of operator applications performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use crate::value::ValueType;

    #[test]
    fn test_evaluates_each_node_once() {
        let mut u = Universe::new();
        let x = u.input(0, ValueType::Double);
        let y = u.input(1, ValueType::Double);
        let sum = u.canonicalize(Operator::Add, &[x, y]).unwrap();
        // sum is shared by both arguments of the product
        let square = u.canonicalize(Operator::Mul, &[sum, sum]).unwrap();

        let mut cache = InstanceCache::new(&u);
        cache.seed_inputs(&[x, y], &[Value::Num(1.0), Value::Num(2.0)]).unwrap();
        assert_eq!(cache.compute_and_memoize(square).unwrap(), Value::Num(9.0));
        assert_eq!(cache.evaluations(), 2);

        assert_eq!(cache.compute_and_memoize(square).unwrap(), Value::Num(9.0));
        assert_eq!(cache.evaluations(), 2);
        assert_eq!(cache.get(sum), Some(Value::Num(3.0)));
    }

    #[test]
    fn test_unseeded_input_is_unreachable() {
        let mut u = Universe::new();
        let a = u.input(0, ValueType::Boolean);
        let not_a = u.canonicalize(Operator::Not, &[a]).unwrap();

        let mut cache = InstanceCache::new(&u);
        assert_eq!(cache.compute_and_memoize(not_a), Err(GraphError::Unreachable(a)));
    }

    #[test]
    fn test_set_overrides() {
        let mut u = Universe::new();
        let a = u.input(0, ValueType::Boolean);
        let not_a = u.canonicalize(Operator::Not, &[a]).unwrap();

        let mut cache = InstanceCache::new(&u);
        cache.set(a, Value::Missing);
        assert!(cache.compute_and_memoize(not_a).unwrap().is_missing());
    }

    #[test]
    fn test_seed_rejects_non_inputs() {
        let mut u = Universe::new();
        let a = u.input(0, ValueType::Boolean);
        let not_a = u.canonicalize(Operator::Not, &[a]).unwrap();

        let mut cache = InstanceCache::new(&u);
        assert_eq!(
            cache.seed_inputs(&[not_a], &[Value::Bool(true)]),
            Err(GraphError::NotAnInput(not_a))
        );
        assert!(cache.seed_inputs(&[a], &[]).is_err());
    }
}
