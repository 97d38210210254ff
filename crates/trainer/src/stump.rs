//! Threshold selection for continuous weak learners
//!
//! Exact-greedy scan over a node's sorted-value index: every distinct value is
//! tried as the threshold of `value <= t`, and the split objective is updated
//! incrementally as examples cross to the `true` side.

use symboost_graph::SortedIndex;

use crate::deterministic::exceeds;
use crate::objective::{SplitObjective, SplitStats};

/// Best split of a continuous column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdChoice {
    pub threshold: f64,
    pub stats: SplitStats,
    pub score: f64,
}

/// Find the threshold maximizing `objective`.
///
/// Examples missing from `sorted` abstain. Only a score better by more than
/// rounding noise replaces the current best, so among tied thresholds the
/// smallest wins.
/// Returns `None` when no example has a value.
pub fn find_best_threshold(
    sorted: &SortedIndex,
    labels: &[bool],
    weights: &[f64],
    objective: &dyn SplitObjective,
) -> Option<ThresholdChoice> {
    if sorted.is_empty() {
        return None;
    }

    let total: f64 = weights.iter().sum();
    let mut positive = 0.0;
    let mut negative = 0.0;
    for &(_, example) in sorted {
        let example = example as usize;
        if labels[example] {
            positive += weights[example];
        } else {
            negative += weights[example];
        }
    }
    let abstain = (total - positive - negative).max(0.0);

    // Weight on the `value <= t` side, split by label.
    let mut positive_le = 0.0;
    let mut negative_le = 0.0;
    let mut best: Option<ThresholdChoice> = None;

    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i].0;
        while i < sorted.len() && sorted[i].0 == value {
            let example = sorted[i].1 as usize;
            if labels[example] {
                positive_le += weights[example];
            } else {
                negative_le += weights[example];
            }
            i += 1;
        }

        let stats = SplitStats {
            correct: positive_le + (negative - negative_le),
            incorrect: negative_le + (positive - positive_le),
            abstain,
        };
        let score = objective.score(&stats);
        if best.map_or(true, |current| exceeds(score, current.score)) {
            best = Some(ThresholdChoice {
                threshold: value,
                stats,
                score,
            });
        }
    }

    best
}
