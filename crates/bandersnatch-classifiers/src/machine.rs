//! The trained rarity classifier.
//!
//! A `Machine` is built once by `Machine::train` and is read-only from then
//! on: schema, label codec, fitted forest and training metadata never
//! change, so `predict` and `describe` can be called from many threads
//! without locking.

use chrono::{DateTime, Utc};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::LabelCodec;
use crate::config::TrainConfig;
use crate::data_handling::{Dataset, Record};
use crate::error::{MachineError, Result};
use crate::forest::{argmax, RandomForest};
use crate::schema::{self, FeatureSchema};

/// Decimal places kept for the reported validation accuracy.
pub const ACCURACY_DECIMALS: i32 = 4;

/// A predicted label with the probability the forest gives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label`, in `[0, 1]`.
    pub confidence: f64,
}

/// Facts recorded by the training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Accuracy on the held-out partition, unrounded.
    pub validation_accuracy: f64,
    /// Class labels in codec order.
    pub classes: Vec<String>,
    pub n_train: usize,
    pub n_validation: usize,
    pub seed: u64,
    pub n_trees: usize,
    pub trained_at: DateTime<Utc>,
}

/// Read-only description of a trained machine for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub features: Vec<String>,
    pub n_features: usize,
    pub classes: Vec<String>,
    /// Rounded to `ACCURACY_DECIMALS` places.
    pub validation_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub(crate) schema: FeatureSchema,
    pub(crate) codec: LabelCodec,
    pub(crate) forest: RandomForest,
    pub(crate) metadata: TrainingMetadata,
}

impl Machine {
    /// Train with the default configuration (target `Rarity`, seed 42,
    /// 100 trees, 80/20 split).
    pub fn new(dataset: &Dataset) -> Result<Self> {
        Self::train(dataset, &TrainConfig::default())
    }

    /// Train a machine on `dataset`.
    ///
    /// # Errors
    ///
    /// * `MachineError::Schema` if the dataset is empty, has no target
    ///   column, or holds a non-numeric feature value.
    /// * `MachineError::Training` if fewer than two classes or fewer than
    ///   `config.min_rows` rows are present, or `config` is unusable.
    pub fn train(dataset: &Dataset, config: &TrainConfig) -> Result<Self> {
        config.validate()?;

        let (schema, table) = schema::extract(dataset, &config.target_column)?;
        let mut codec = LabelCodec::new();
        let y = codec.fit(table.labels.as_slice())?;

        if codec.n_classes() < 2 {
            return Err(MachineError::training(format!(
                "need at least 2 distinct '{}' classes, found {}",
                schema.target(),
                codec.n_classes()
            )));
        }
        let n_rows = y.len();
        if n_rows < config.min_rows {
            return Err(MachineError::training(format!(
                "need at least {} rows to split off a validation set, found {}",
                config.min_rows, n_rows
            )));
        }

        let (train_idx, valid_idx) = split_indices(n_rows, config.validation_fraction, config.seed);
        if train_idx.is_empty() || valid_idx.is_empty() {
            return Err(MachineError::training(format!(
                "split of {} rows at validation_fraction {} leaves an empty partition",
                n_rows, config.validation_fraction
            )));
        }
        log::debug!(
            "Split {} rows into {} training and {} validation rows (seed {})",
            n_rows,
            train_idx.len(),
            valid_idx.len(),
            config.seed
        );

        let x_train = table.x.select(Axis(0), &train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let forest = RandomForest::fit(
            x_train.view(),
            &y_train,
            codec.n_classes(),
            &config.forest,
            config.seed,
        );

        let correct = valid_idx
            .iter()
            .filter(|&&i| {
                let row = table.x.row(i).to_vec();
                argmax(&forest.predict_proba(&row)) == Some(y[i])
            })
            .count();
        let validation_accuracy = correct as f64 / valid_idx.len() as f64;

        log::info!(
            "Trained rarity forest: {} classes, {} features, validation accuracy {:.4}",
            codec.n_classes(),
            schema.len(),
            validation_accuracy
        );

        let metadata = TrainingMetadata {
            validation_accuracy,
            classes: codec.classes().to_vec(),
            n_train: train_idx.len(),
            n_validation: valid_idx.len(),
            seed: config.seed,
            n_trees: forest.n_trees(),
            trained_at: Utc::now(),
        };

        Ok(Machine {
            schema,
            codec,
            forest,
            metadata,
        })
    }

    /// Predict the label of a single row.
    ///
    /// The row must carry exactly the feature columns seen at training time,
    /// each castable to a float. Ties between classes go to the lowest code.
    pub fn predict(&self, record: &Record) -> Result<Prediction> {
        let probs = self.class_probabilities(record)?;
        let code = argmax(&probs)
            .ok_or_else(|| MachineError::prediction("model produced no class probabilities"))?;
        let label = self.codec.decode(code)?.to_string();
        Ok(Prediction {
            label,
            confidence: probs[code],
        })
    }

    /// Probability of every class for one row, in codec order.
    pub fn predict_proba(&self, record: &Record) -> Result<Vec<(String, f64)>> {
        let probs = self.class_probabilities(record)?;
        Ok(self
            .codec
            .classes()
            .iter()
            .cloned()
            .zip(probs)
            .collect())
    }

    /// Predict several rows. Fails with the error of the first invalid row.
    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<Prediction>> {
        let results: Vec<Result<Prediction>> = records.par_iter().map(|r| self.predict(r)).collect();
        results.into_iter().collect()
    }

    pub fn describe(&self) -> ModelSummary {
        ModelSummary {
            features: self.schema.features().to_vec(),
            n_features: self.schema.len(),
            classes: self.codec.classes().to_vec(),
            validation_accuracy: round_to(self.metadata.validation_accuracy, ACCURACY_DECIMALS),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    fn class_probabilities(&self, record: &Record) -> Result<Vec<f64>> {
        let features = self.schema.vectorize(record)?;
        Ok(self.forest.predict_proba(&features))
    }
}

/// Shuffle `0..n` with `seed` and cut off `ceil(n * validation_fraction)`
/// rows for validation. Returns `(train, validation)`.
pub fn split_indices(n: usize, validation_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let n_valid = ((n as f64 * validation_fraction).ceil() as usize).min(n);
    let train = indices.split_off(n_valid);
    (train, indices)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use crate::data_handling::{record, Value};

    fn two_class_dataset() -> Dataset {
        Dataset::from_records((0..12).map(|i| {
            let rare = i % 2 == 1;
            vec![
                ("Level", Value::Int(if rare { 80 + i } else { 10 + i })),
                ("Health", Value::Int(50)),
                ("Rarity", Value::from(if rare { "Rare" } else { "Common" })),
            ]
        }))
    }

    fn quick_config() -> TrainConfig {
        TrainConfig::default().with_forest(ForestConfig {
            n_trees: 10,
            ..ForestConfig::default()
        })
    }

    #[test]
    fn split_indices_is_seeded_and_disjoint() {
        let (train, valid) = split_indices(20, 0.2, 42);
        assert_eq!(valid.len(), 4);
        assert_eq!(train.len(), 16);
        let mut all: Vec<usize> = train.iter().chain(valid.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
        assert_eq!(split_indices(20, 0.2, 42), (train, valid));
    }

    #[test]
    fn split_rounds_validation_size_up() {
        let (train, valid) = split_indices(5, 0.2, 1);
        assert_eq!((train.len(), valid.len()), (4, 1));
        let (train, valid) = split_indices(6, 0.2, 1);
        assert_eq!((train.len(), valid.len()), (4, 2));
    }

    #[test]
    fn round_to_four_places() {
        assert_eq!(round_to(0.833333, 4), 0.8333);
        assert_eq!(round_to(1.0, 4), 1.0);
    }

    #[test]
    fn train_rejects_too_few_rows() {
        let ds = Dataset::from_records((0..4).map(|i| {
            vec![
                ("Level", Value::Int(i)),
                ("Rarity", Value::from(if i % 2 == 0 { "A" } else { "B" })),
            ]
        }));
        assert!(matches!(
            Machine::train(&ds, &quick_config()),
            Err(MachineError::Training(_))
        ));
    }

    #[test]
    fn train_rejects_split_with_empty_training_partition() {
        let ds = Dataset::from_records((0..5).map(|i| {
            vec![
                ("Level", Value::Int(i)),
                ("Rarity", Value::from(if i % 2 == 0 { "A" } else { "B" })),
            ]
        }));
        let mut config = quick_config();
        config.validation_fraction = 0.99;
        match Machine::train(&ds, &config) {
            Err(MachineError::Training(msg)) => assert!(msg.contains("empty partition")),
            other => panic!("expected training error, got {:?}", other.map(|m| m.describe())),
        }
    }

    #[test]
    fn train_with_custom_target_column() {
        let ds = two_class_dataset();
        let renamed = Dataset::new(
            vec!["Level".into(), "Health".into(), "Tier".into()],
            ds.rows().to_vec(),
        )
        .unwrap();
        let mut config = quick_config();
        config.target_column = "Tier".to_string();
        let machine = Machine::train(&renamed, &config).unwrap();
        assert_eq!(machine.schema().target(), "Tier");
        assert_eq!(machine.describe().features, vec!["Level", "Health"]);
    }

    #[test]
    fn predict_proba_covers_every_class() {
        let machine = Machine::train(&two_class_dataset(), &quick_config()).unwrap();
        let probs = machine
            .predict_proba(&record([("Level", Value::Int(90)), ("Health", Value::Int(50))]))
            .unwrap();
        let labels: Vec<&str> = probs.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Common", "Rare"]);
        let total: f64 = probs.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn metadata_records_partition_sizes() {
        let machine = Machine::train(&two_class_dataset(), &quick_config()).unwrap();
        let meta = machine.metadata();
        assert_eq!(meta.n_train + meta.n_validation, 12);
        assert_eq!(meta.n_validation, 3);
        assert_eq!(meta.n_trees, 10);
        assert_eq!(meta.seed, 42);
    }

    #[test]
    fn machine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Machine>();
    }
}
