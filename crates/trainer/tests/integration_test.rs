//! End-to-end boosting runs
//!
//! Covers the logical-AND scenario, determinism across runs, validation
//! tracking and early stopping.

use anyhow::Result;
use std::io::Write;
use symboost_graph::{Operator, Value};
use symboost_trainer::{
    BoostingLearner, Dataset, MetricKind, SearchConfig, SearchSpace, StopReason, TrainerConfig,
};
use tempfile::NamedTempFile;

fn and_dataset() -> Dataset {
    let a = [true, true, false, false];
    let b = [true, false, true, false];
    Dataset::from_columns(
        vec!["a".to_string(), "b".to_string()],
        vec![
            a.iter().map(|&x| Value::Bool(x)).collect(),
            b.iter().map(|&x| Value::Bool(x)).collect(),
        ],
        a.iter().zip(&b).map(|(&x, &y)| x && y).collect(),
    )
    .unwrap()
}

fn depth_one() -> TrainerConfig {
    let mut config = TrainerConfig::default();
    config.search.max_depth = 1;
    config
}

/// `label = x <= 3 or flag`, with a few missing cells.
fn create_mixed_csv(rows: usize) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "x,flag,label")?;
    for i in 0..rows {
        let x = (i % 7) as f64 + 0.5;
        let flag = i % 5 == 0;
        let label = x <= 3.0 || flag;
        let x_cell = if i % 11 == 3 { "?".to_string() } else { x.to_string() };
        writeln!(file, "{},{},{}", x_cell, flag, label)?;
    }
    file.flush()?;
    Ok(file)
}

#[test]
fn test_and_candidates_at_depth_one() {
    let dataset = and_dataset();
    let learner = BoostingLearner::new(depth_one(), &dataset, None).unwrap();
    let mut graph = learner.graph().clone();
    let inputs = graph.inputs().to_vec();
    let primitives = TrainerConfig::default().primitive_set().unwrap();
    let config = SearchConfig {
        max_depth: 1,
        ..SearchConfig::default()
    };
    let space = SearchSpace::new(&inputs, &primitives, &config);

    let mut found: Vec<_> = space
        .candidates(graph.universe_mut())
        .collect::<symboost_graph::Result<_>>()
        .unwrap();
    found.sort();

    let (a, b) = (inputs[0], inputs[1]);
    let universe = graph.universe_mut();
    let mut expected = vec![
        a,
        b,
        universe.canonicalize(Operator::And, &[a, b]).unwrap(),
        universe.canonicalize(Operator::Or, &[a, b]).unwrap(),
        universe.canonicalize(Operator::Not, &[a]).unwrap(),
        universe.canonicalize(Operator::Not, &[b]).unwrap(),
    ];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn test_and_is_learned_in_one_iteration() {
    let dataset = and_dataset();
    let mut learner = BoostingLearner::new(depth_one(), &dataset, None).unwrap();

    let reason = learner.train().unwrap();
    assert_eq!(reason, StopReason::PerfectFit);

    let history = learner.history();
    assert_eq!(history.len(), 1);
    let report = history.last().unwrap();
    assert_eq!(report.description, "and(a, b)");
    assert_eq!(report.threshold, None);
    assert_eq!(report.candidates, 6);
    assert_eq!(report.train_metric, 0.0);
    assert!(report.vote > 0.0);

    let model = learner.into_model();
    for example in 0..dataset.len() {
        let prediction = model.predict(&dataset.row(example)).unwrap();
        assert_eq!(prediction, Value::Bool(dataset.labels[example]));
    }
}

#[test]
fn test_parallel_search_learns_the_same_model() {
    let dataset = and_dataset();
    let mut sequential = BoostingLearner::new(depth_one(), &dataset, None).unwrap();
    sequential.train().unwrap();

    let mut config = depth_one();
    config.search.parallel = true;
    let mut parallel = BoostingLearner::new(config, &dataset, None).unwrap();
    parallel.train().unwrap();

    // Node ids depend on creation order, so compare what was learned.
    let learned = |learner: &BoostingLearner| -> Vec<(String, f64, f64)> {
        learner
            .history()
            .iterations
            .iter()
            .map(|report| (report.description.clone(), report.vote, report.train_metric))
            .collect()
    };
    assert_eq!(learned(&sequential), learned(&parallel));
    assert_eq!(parallel.history().last().unwrap().candidates, 6);
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let file = create_mixed_csv(60)?;
    let mut config = TrainerConfig::default();
    config.search.primitives = vec!["and".into(), "or".into(), "not".into(), "neg".into()];
    config.boosting.max_iterations = 5;
    config.boosting.stop_on_perfect = false;

    let mut first = Dataset::from_csv(file.path())?;
    let mut second = first.clone();
    first.shuffle(7);
    second.shuffle(7);

    let mut learner1 = BoostingLearner::new(config.clone(), &first, None)?;
    let mut learner2 = BoostingLearner::new(config, &second, None)?;
    learner1.train()?;
    learner2.train()?;

    assert_eq!(learner1.history(), learner2.history());
    assert_eq!(learner1.votes(), learner2.votes());
    Ok(())
}

#[test]
fn test_mixed_dataset_with_validation() -> Result<()> {
    let file = create_mixed_csv(80)?;
    let mut dataset = Dataset::from_csv(file.path())?;
    dataset.shuffle(3);
    let (train, valid) = dataset.split(0.25)?;

    let mut config = TrainerConfig::default();
    config.search.primitives = vec!["or".into(), "not".into()];
    config.boosting.max_iterations = 10;
    config.cache.max_entries = 4;
    let mut learner = BoostingLearner::new(config, &train, Some(&valid))?;
    learner.train()?;

    let history = learner.history();
    assert!(!history.is_empty());
    for report in &history.iterations {
        assert!(report.valid_metric.is_some());
    }

    // The incrementally maintained validation scores agree with the model.
    let valid_scores = learner.valid_predictions().unwrap().to_vec();
    let model = learner.model();
    let recomputed = model.score_dataset(&valid)?;
    for (incremental, scratch) in valid_scores.iter().zip(&recomputed) {
        assert!((incremental - scratch).abs() < 1e-9);
    }

    // Every yield is either a boolean expression or a stump, and the graph
    // stays closed under dependencies.
    model.graph().check_invariants()?;
    Ok(())
}

#[test]
fn test_early_stopping() -> Result<()> {
    // Equal x values carry opposite labels, so the training error can never
    // drop below 2/5 and stops improving after the first stump.
    let x: Vec<Value> = [1.0, 1.0, 2.0, 2.0, 3.0]
        .iter()
        .map(|&v| Value::Num(v))
        .collect();
    let labels = vec![true, false, true, false, true];
    let dataset = Dataset::from_columns(vec!["x".to_string()], vec![x], labels)?;

    let mut config = TrainerConfig::default();
    config.search.primitives = vec!["neg".into()];
    config.search.max_depth = 0;
    config.boosting.max_iterations = 100;
    config.boosting.patience = 2;
    config.boosting.metric = MetricKind::ErrorRate;
    let mut learner = BoostingLearner::new(config, &dataset, None)?;

    // The first stump already reaches the floor; two stale iterations follow.
    assert_eq!(learner.train()?, StopReason::EarlyStopped);
    assert_eq!(learner.votes().len(), 3);
    assert_eq!(learner.history().stop_reason, Some(StopReason::EarlyStopped));
    for report in &learner.history().iterations {
        assert!(report.train_metric >= 0.4 - 1e-12);
    }
    Ok(())
}

#[test]
fn test_train_from_csv() -> Result<()> {
    let file = create_mixed_csv(30)?;
    let mut config = TrainerConfig::default();
    config.boosting.max_iterations = 3;
    let (model, history) = symboost_trainer::train_from_csv(file.path(), config)?;

    assert_eq!(model.len(), history.len());
    assert!(history.stop_reason.is_some());
    Ok(())
}
