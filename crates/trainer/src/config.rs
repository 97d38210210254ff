//! Trainer configuration
//!
//! Defaults, then an optional TOML file, then `SYMBOOST_*` environment
//! variables. Command-line flags are applied last by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use symboost_graph::PrimitiveSet;
use tracing::{info, warn};

use crate::errors::{Result, TrainerError};
use crate::objective::{MetricKind, ObjectiveKind};
use crate::search::SearchConfig;

/// Trainer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrainerConfig {
    /// Weak-learner search configuration
    pub search: SearchConfig,
    /// Samples cache configuration
    pub cache: CacheConfig,
    /// Boosting loop configuration
    pub boosting: BoostingConfig,
}

/// Samples cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Max derived columns kept per dataset; input columns are not counted
    pub max_entries: usize,
}

/// Boosting loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub max_iterations: usize,
    /// Iterations without metric improvement before stopping; 0 disables
    pub patience: usize,
    /// Margin a candidate must score above the objective's chance baseline
    pub min_score: f64,
    /// Smoothing added to both weight sums in the vote formula
    pub vote_smoothing: f64,
    pub objective: ObjectiveKind,
    pub metric: MetricKind,
    /// Stop once the training metric is perfect
    pub stop_on_perfect: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 256 }
    }
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            patience: 0,
            min_score: 0.0,
            vote_smoothing: 1e-6,
            objective: ObjectiveKind::AbsoluteEdge,
            metric: MetricKind::ErrorRate,
            stop_on_perfect: true,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, current: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparsable environment override");
                current
            }
        },
        Err(_) => current,
    }
}

impl TrainerConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config: TrainerConfig = toml::from_str(&content)
            .map_err(|e| TrainerError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Apply `SYMBOOST_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.search.max_depth = parse_env("SYMBOOST_SEARCH_MAX_DEPTH", self.search.max_depth);
        self.search.parallel = parse_env("SYMBOOST_SEARCH_PARALLEL", self.search.parallel);
        if let Ok(raw) = std::env::var("SYMBOOST_SEARCH_PRIMITIVES") {
            self.search.primitives = raw.split(',').map(|name| name.trim().to_string()).collect();
        }
        if let Ok(raw) = std::env::var("SYMBOOST_SEARCH_MAX_STEPS") {
            match raw.parse() {
                Ok(steps) => self.search.max_steps = Some(steps),
                Err(_) => warn!(value = %raw, "ignoring unparsable SYMBOOST_SEARCH_MAX_STEPS"),
            }
        }

        self.cache.max_entries = parse_env("SYMBOOST_CACHE_MAX_ENTRIES", self.cache.max_entries);

        let boosting = &mut self.boosting;
        boosting.max_iterations =
            parse_env("SYMBOOST_BOOSTING_MAX_ITERATIONS", boosting.max_iterations);
        boosting.patience = parse_env("SYMBOOST_BOOSTING_PATIENCE", boosting.patience);
        boosting.min_score = parse_env("SYMBOOST_BOOSTING_MIN_SCORE", boosting.min_score);
        boosting.vote_smoothing =
            parse_env("SYMBOOST_BOOSTING_VOTE_SMOOTHING", boosting.vote_smoothing);
    }

    /// Parsed primitive set of the search section.
    pub fn primitive_set(&self) -> Result<PrimitiveSet> {
        PrimitiveSet::from_names(&self.search.primitives)
            .map_err(|e| TrainerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let primitives = self.primitive_set()?;
        if primitives.is_empty() {
            return Err(TrainerError::Config("at least one primitive is required".to_string()));
        }
        if self.search.max_depth > 8 {
            return Err(TrainerError::Config(format!(
                "search depth {} is too large (max 8)",
                self.search.max_depth
            )));
        }
        if self.search.max_steps == Some(0) {
            return Err(TrainerError::Config("max_steps must be positive".to_string()));
        }
        if self.boosting.max_iterations == 0 {
            return Err(TrainerError::Config("max_iterations must be positive".to_string()));
        }
        if !(self.boosting.vote_smoothing > 0.0 && self.boosting.vote_smoothing.is_finite()) {
            return Err(TrainerError::Config(
                "vote_smoothing must be a positive finite number".to_string(),
            ));
        }
        if !self.boosting.min_score.is_finite() {
            return Err(TrainerError::Config("min_score must be finite".to_string()));
        }
        Ok(())
    }
}
