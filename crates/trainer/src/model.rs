//! Trained boosted model: a frozen graph plus one vote per yield point.

use serde::{Deserialize, Serialize};
use symboost_graph::{Graph, NodeId, Value};

use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};

#[derive(Debug, Clone)]
pub struct BoostedModel {
    graph: Graph,
    votes: Vec<f64>,
}

/// Human-readable view of one vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTerm {
    pub node: NodeId,
    pub vote: f64,
    pub expression: String,
}

impl BoostedModel {
    /// Pair the graph's yield points with `votes`, in order.
    pub fn new(graph: Graph, votes: Vec<f64>) -> Self {
        debug_assert_eq!(graph.yields().len(), votes.len());
        Self { graph, votes }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn votes(&self) -> &[f64] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Weighted vote `Σ αᵢ·hᵢ(x)` for one example, `None` when every yield
    /// evaluated to missing.
    ///
    /// Uses a fresh instance cache, so shared sub-expressions are evaluated
    /// once per call and concurrent calls do not interfere.
    pub fn predict_score(&self, example: &[Value]) -> Result<Option<f64>> {
        let mut cache = self.graph.instance_cache(example)?;
        let mut score = 0.0;
        let mut voted = false;
        for (&node, &vote) in self.graph.yields().iter().zip(&self.votes) {
            match cache.compute_and_memoize(node)?.as_bool() {
                Some(true) => score += vote,
                Some(false) => score -= vote,
                None => continue,
            }
            voted = true;
        }
        Ok(voted.then_some(score))
    }

    /// `Bool(score > 0)`, or `Missing` when no yield could vote.
    pub fn predict(&self, example: &[Value]) -> Result<Value> {
        Ok(match self.predict_score(example)? {
            Some(score) => Value::Bool(score > 0.0),
            None => Value::Missing,
        })
    }

    /// Scores of every example; examples without any vote score 0.
    pub fn score_dataset(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        if dataset.names.as_slice() != self.graph.input_names() {
            return Err(TrainerError::Dataset(
                "dataset columns differ from the model inputs".to_string(),
            ));
        }
        (0..dataset.len())
            .map(|example| Ok(self.predict_score(&dataset.row(example))?.unwrap_or(0.0)))
            .collect()
    }

    pub fn terms(&self) -> Vec<ModelTerm> {
        self.graph
            .yields()
            .iter()
            .zip(&self.votes)
            .map(|(&node, &vote)| ModelTerm {
                node,
                vote,
                expression: self.graph.describe(node),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use symboost_graph::{Operator, ValueType};

    fn and_model() -> BoostedModel {
        let mut graph = Graph::new();
        let a = graph.add_input("a", ValueType::Boolean);
        let b = graph.add_input("b", ValueType::Boolean);
        let and = graph.universe_mut().canonicalize(Operator::And, &[a, b]).unwrap();
        graph.add_yield(and).unwrap();
        graph.add_yield(a).unwrap();
        BoostedModel::new(graph, vec![2.0, 0.5])
    }

    #[test]
    fn test_predict() {
        let model = and_model();
        let t = Value::Bool(true);
        let f = Value::Bool(false);

        assert_eq!(model.predict_score(&[t, t]).unwrap(), Some(2.5));
        assert_eq!(model.predict(&[t, t]).unwrap(), t);
        assert_eq!(model.predict_score(&[t, f]).unwrap(), Some(-1.5));
        assert_eq!(model.predict(&[f, f]).unwrap(), f);
    }

    #[test]
    fn test_missing_votes() {
        let model = and_model();
        let m = Value::Missing;
        // and(missing, true) is missing, `a` is missing: nobody votes.
        assert_eq!(model.predict(&[m, Value::Bool(true)]).unwrap(), Value::Missing);
        // and(true, missing) is missing, `a` still votes.
        assert_eq!(model.predict_score(&[Value::Bool(true), m]).unwrap(), Some(0.5));
    }

    #[test]
    fn test_wrong_example_width() {
        assert!(and_model().predict(&[Value::Bool(true)]).is_err());
    }

    #[test]
    fn test_concurrent_prediction() {
        let model = Arc::new(and_model());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let model = Arc::clone(&model);
                std::thread::spawn(move || {
                    let a = Value::Bool(i % 2 == 0);
                    model.predict(&[a, Value::Bool(true)]).unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Value::Bool(i % 2 == 0));
        }
    }

    #[test]
    fn test_terms() {
        let terms = and_model().terms();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].expression, "and(a, b)");
        assert_eq!(terms[1].vote, 0.5);
    }
}
