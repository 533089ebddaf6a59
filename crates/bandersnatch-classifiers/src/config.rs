use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{MachineError, Result};

/// Default name of the label column in monster datasets.
pub const DEFAULT_TARGET_COLUMN: &str = "Rarity";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;
/// Smallest dataset that still leaves at least one held-out row and a
/// handful of training rows after the split.
pub const DEFAULT_MIN_ROWS: usize = 5;
pub const DEFAULT_N_TREES: usize = 100;

/// Central configuration for a training run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub target_column: String,
    /// Seed for the train/validation shuffle and for every tree in the forest.
    pub seed: u64,
    /// Share of rows held out to measure validation accuracy.
    pub validation_fraction: f64,
    pub min_rows: usize,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            seed: DEFAULT_SEED,
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            min_rows: DEFAULT_MIN_ROWS,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new(target_column: impl Into<String>, seed: u64) -> Self {
        Self {
            target_column: target_column.into(),
            seed,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Reject settings that cannot produce a usable split or forest.
    pub fn validate(&self) -> Result<()> {
        if self.target_column.trim().is_empty() {
            return Err(MachineError::training("target column name is empty"));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(MachineError::training(format!(
                "validation_fraction must lie in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if self.min_rows < 2 {
            return Err(MachineError::training(format!(
                "min_rows must be at least 2, got {}",
                self.min_rows
            )));
        }
        self.forest.validate()
    }
}

/// Hyper-parameters of the random forest.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree; otherwise every tree sees the full
    /// training partition.
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(MachineError::training("n_trees must be positive"));
        }
        if self.min_samples_split < 2 {
            return Err(MachineError::training(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(MachineError::training("min_samples_leaf must be positive"));
        }
        if self.max_depth == Some(0) {
            return Err(MachineError::training("max_depth must be positive"));
        }
        self.max_features.validate()
    }
}

/// Number of candidate features examined at each split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` columns, always in
    /// `1..=n_features`.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match *self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(c) => c,
            MaxFeatures::Fraction(f) => (f * n) as usize,
        };
        k.clamp(1, n_features.max(1))
    }

    fn validate(&self) -> Result<()> {
        match *self {
            MaxFeatures::Count(0) => Err(MachineError::training("max_features count must be positive")),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(MachineError::training(format!(
                "max_features fraction must lie in (0, 1], got {}",
                f
            ))),
            _ => Ok(()),
        }
    }
}

impl FromStr for MaxFeatures {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" | "none" => Ok(MaxFeatures::All),
            other => {
                if let Ok(count) = other.parse::<usize>() {
                    Ok(MaxFeatures::Count(count))
                } else if let Ok(fraction) = other.parse::<f64>() {
                    Ok(MaxFeatures::Fraction(fraction))
                } else {
                    Err(format!(
                        "Unknown max_features: {}. Expected sqrt, log2, all, a count or a fraction",
                        s
                    ))
                }
            }
        }
    }
}

/// Load a `TrainConfig` from a JSON file. Missing fields take their defaults.
pub fn load_train_config<P: AsRef<Path>>(path: P) -> anyhow::Result<TrainConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: TrainConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
