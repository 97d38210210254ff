//! Symboost trainer CLI
//!
//! Boosts symbolic weak learners on a CSV dataset and writes a canonical JSON
//! report of the run.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use symboost_trainer::{
    Accuracy, BoostingLearner, Dataset, Metric, TrainerConfig, TrainingReport, VERSION,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "symboost-train")]
#[command(author = "Symboost Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Boosting over searched symbolic weak learners", long_about = None)]
struct Args {
    /// Training CSV (header row, last column is the boolean label)
    #[arg(short, long)]
    train: PathBuf,

    /// Validation CSV with the same columns
    #[arg(long, conflicts_with = "valid_fraction")]
    valid: Option<PathBuf>,

    /// Hold out this share of the shuffled training set for validation
    #[arg(long)]
    valid_fraction: Option<f64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum boosting iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Maximum expression depth of weak learners
    #[arg(long)]
    max_depth: Option<usize>,

    /// Comma-separated primitive functions, e.g. "and,or,not"
    #[arg(long, value_delimiter = ',')]
    primitives: Option<Vec<String>>,

    /// Max derived columns kept in each samples cache
    #[arg(long)]
    cache_entries: Option<usize>,

    /// Search top-level branches in parallel
    #[arg(long)]
    parallel: bool,

    /// Seed for deterministic shuffling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Skip dataset shuffling
    #[arg(long)]
    no_shuffle: bool,

    /// Write the training report (canonical JSON) here
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<TrainerConfig> {
    let mut config = match &args.config {
        Some(path) => TrainerConfig::load_from_file(path).context("Failed to load configuration")?,
        None => TrainerConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(iterations) = args.iterations {
        config.boosting.max_iterations = iterations;
    }
    if let Some(depth) = args.max_depth {
        config.search.max_depth = depth;
    }
    if let Some(primitives) = &args.primitives {
        config.search.primitives = primitives.clone();
    }
    if let Some(entries) = args.cache_entries {
        config.cache.max_entries = entries;
    }
    if args.parallel {
        config.search.parallel = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Symboost trainer v{}", VERSION);

    let config = load_config(&args)?;

    info!("Loading dataset from: {}", args.train.display());
    let mut train = Dataset::from_csv(&args.train).context("Failed to load training set")?;
    if !args.no_shuffle {
        info!("Shuffling dataset with seed: {}", args.seed);
        train.shuffle(args.seed);
    }

    let (train, valid) = match (&args.valid, args.valid_fraction) {
        (Some(path), _) => {
            let valid = Dataset::from_csv(path).context("Failed to load validation set")?;
            (train, Some(valid))
        }
        (None, Some(fraction)) => {
            let (train, valid) = train.split(fraction)?;
            (train, Some(valid))
        }
        (None, None) => (train, None),
    };

    info!(
        "Loaded {} training examples with {} features ({:.1}% positive)",
        train.len(),
        train.num_features(),
        train.positive_rate() * 100.0
    );
    for (name, ty) in train.names.iter().zip(&train.types) {
        info!("  {}: {}", name, ty);
    }
    if let Some(valid) = &valid {
        info!("Validation examples: {}", valid.len());
    }

    info!("Training configuration:");
    info!("  Primitives: {}", config.search.primitives.join(","));
    info!("  Max depth: {}", config.search.max_depth);
    info!("  Max iterations: {}", config.boosting.max_iterations);
    info!("  Cache entries: {}", config.cache.max_entries);

    let mut learner = BoostingLearner::new(config.clone(), &train, valid.as_ref())?;
    let reason = learner.train()?;
    let history = learner.history().clone();
    let model = learner.into_model();

    info!("Training stopped: {:?} after {} iterations", reason, model.len());
    for term in model.terms() {
        info!("  {:+.4} * {}", term.vote, term.expression);
    }

    let train_accuracy = Accuracy.evaluate(&model.score_dataset(&train)?, &train.labels);
    info!("Training accuracy: {:.4}", train_accuracy);
    if let Some(valid) = &valid {
        let valid_accuracy = Accuracy.evaluate(&model.score_dataset(valid)?, &valid.labels);
        info!("Validation accuracy: {:.4}", valid_accuracy);
    }

    if let Some(path) = &args.report {
        let report = TrainingReport {
            version: VERSION.to_string(),
            config,
            history,
            terms: model.terms(),
        };
        report.write_to(path).context("Failed to write report")?;
        info!("Report written to: {}", path.display());
    }

    Ok(())
}
