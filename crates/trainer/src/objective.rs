//! Split objectives used to rank weak learners, and metrics used to evaluate
//! prediction vectors.
//!
//! Labels are booleans read as ±1. A boolean decision predicts +1 for `true`,
//! -1 for `false` and abstains on missing values.

use serde::{Deserialize, Serialize};
use symboost_graph::Value;

/// Weighted outcome of one boolean decision against the labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitStats {
    pub correct: f64,
    pub incorrect: f64,
    pub abstain: f64,
}

impl SplitStats {
    /// Tally a boolean column; numeric values count as abstentions.
    pub fn from_decisions(decisions: &[Value], labels: &[bool], weights: &[f64]) -> Self {
        let mut stats = Self::default();
        for ((decision, &label), &weight) in decisions.iter().zip(labels).zip(weights) {
            match decision.as_bool() {
                Some(predicted) if predicted == label => stats.correct += weight,
                Some(_) => stats.incorrect += weight,
                None => stats.abstain += weight,
            }
        }
        stats
    }

    pub fn total(&self) -> f64 {
        self.correct + self.incorrect + self.abstain
    }

    pub fn edge(&self) -> f64 {
        self.correct - self.incorrect
    }
}

/// Ranks split statistics; higher is better.
pub trait SplitObjective: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, stats: &SplitStats) -> f64;

    /// Score of a decision no better than chance.
    fn baseline(&self) -> f64;
}

/// |correct − incorrect|. A consistently wrong decision is as useful as a right
/// one since its vote simply turns negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteEdge;

impl SplitObjective for AbsoluteEdge {
    fn name(&self) -> &'static str {
        "absolute_edge"
    }

    fn score(&self, stats: &SplitStats) -> f64 {
        stats.edge().abs()
    }

    fn baseline(&self) -> f64 {
        0.0
    }
}

/// Share of the total weight classified correctly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAccuracy;

impl SplitObjective for WeightedAccuracy {
    fn name(&self) -> &'static str {
        "weighted_accuracy"
    }

    fn score(&self, stats: &SplitStats) -> f64 {
        let total = stats.total();
        if total > 0.0 {
            stats.correct / total
        } else {
            0.0
        }
    }

    fn baseline(&self) -> f64 {
        0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    AbsoluteEdge,
    WeightedAccuracy,
}

impl ObjectiveKind {
    pub fn build(self) -> Box<dyn SplitObjective> {
        match self {
            ObjectiveKind::AbsoluteEdge => Box::new(AbsoluteEdge),
            ObjectiveKind::WeightedAccuracy => Box::new(WeightedAccuracy),
        }
    }
}

/// Scores a prediction vector `F(x)` against the labels.
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, scores: &[f64], labels: &[bool]) -> f64;
    fn higher_is_better(&self) -> bool;

    /// Whether `value` cannot be improved upon.
    fn is_perfect(&self, value: f64) -> bool;

    fn improves(&self, candidate: f64, best: f64) -> bool {
        if self.higher_is_better() {
            candidate > best
        } else {
            candidate < best
        }
    }
}

fn signed(label: bool) -> f64 {
    if label {
        1.0
    } else {
        -1.0
    }
}

/// Share of examples whose score sign disagrees with the label. A zero score
/// is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorRate;

impl Metric for ErrorRate {
    fn name(&self) -> &'static str {
        "error_rate"
    }

    fn evaluate(&self, scores: &[f64], labels: &[bool]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let errors = scores
            .iter()
            .zip(labels)
            .filter(|&(&score, &label)| score * signed(label) <= 0.0)
            .count();
        errors as f64 / scores.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn is_perfect(&self, value: f64) -> bool {
        value == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn name(&self) -> &'static str {
        "accuracy"
    }

    fn evaluate(&self, scores: &[f64], labels: &[bool]) -> f64 {
        1.0 - ErrorRate.evaluate(scores, labels)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn is_perfect(&self, value: f64) -> bool {
        value == 1.0
    }
}

/// Mean of exp(−y·F(x)), the quantity AdaBoost minimizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialLoss;

impl Metric for ExponentialLoss {
    fn name(&self) -> &'static str {
        "exponential_loss"
    }

    fn evaluate(&self, scores: &[f64], labels: &[bool]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let sum: f64 = scores
            .iter()
            .zip(labels)
            .map(|(&score, &label)| (-signed(label) * score).exp())
            .sum();
        sum / scores.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn is_perfect(&self, _value: f64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    ErrorRate,
    ExponentialLoss,
    Accuracy,
}

impl MetricKind {
    pub fn build(self) -> Box<dyn Metric> {
        match self {
            MetricKind::ErrorRate => Box::new(ErrorRate),
            MetricKind::ExponentialLoss => Box::new(ExponentialLoss),
            MetricKind::Accuracy => Box::new(Accuracy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_stats() {
        let decisions = [
            Value::Bool(true),
            Value::Bool(false),
            Value::Missing,
            Value::Bool(true),
        ];
        let labels = [true, false, true, false];
        let weights = [0.25; 4];
        let stats = SplitStats::from_decisions(&decisions, &labels, &weights);
        assert_eq!(stats.correct, 0.5);
        assert_eq!(stats.incorrect, 0.25);
        assert_eq!(stats.abstain, 0.25);
        assert_eq!(stats.total(), 1.0);
    }

    #[test]
    fn test_objectives() {
        let stats = SplitStats {
            correct: 0.25,
            incorrect: 0.75,
            abstain: 0.0,
        };
        assert_eq!(AbsoluteEdge.score(&stats), 0.5);
        assert_eq!(WeightedAccuracy.score(&stats), 0.25);
        assert_eq!(WeightedAccuracy.score(&SplitStats::default()), 0.0);
        assert_eq!(AbsoluteEdge.baseline(), 0.0);
        assert_eq!(WeightedAccuracy.baseline(), 0.5);
    }

    #[test]
    fn test_error_rate_counts_zero_scores() {
        let labels = [true, false, true];
        assert_eq!(ErrorRate.evaluate(&[1.0, -2.0, 0.5], &labels), 0.0);
        assert_eq!(ErrorRate.evaluate(&[0.0, -2.0, -0.5], &labels), 2.0 / 3.0);
        assert_eq!(Accuracy.evaluate(&[1.0, -2.0, 0.5], &labels), 1.0);
        assert!(ErrorRate.is_perfect(0.0));
    }

    #[test]
    fn test_exponential_loss() {
        let loss = ExponentialLoss.evaluate(&[0.0, 0.0], &[true, false]);
        assert_eq!(loss, 1.0);
        assert!(ExponentialLoss.evaluate(&[2.0], &[true]) < 1.0);
        assert!(ExponentialLoss.improves(0.5, 1.0));
        assert!(Accuracy.improves(0.9, 0.8));
    }

    #[test]
    fn test_kind_round_trip() {
        let kind: MetricKind = serde_json::from_str("\"exponential_loss\"").unwrap();
        assert_eq!(kind, MetricKind::ExponentialLoss);
        assert_eq!(kind.build().name(), "exponential_loss");
        assert_eq!(ObjectiveKind::default().build().name(), "absolute_edge");
    }
}
