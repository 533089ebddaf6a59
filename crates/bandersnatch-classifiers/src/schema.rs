//! Feature/label schema extraction.
//!
//! `extract` is the validation pass that turns a loosely typed `Dataset`
//! into a numeric feature matrix plus string labels. `FeatureSchema`
//! applies the same rules to single prediction rows.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Dataset, Record};
use crate::error::{MachineError, Result};

/// Feature columns (in training order) and the target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<String>,
    target: String,
}

/// Typed view of a dataset after validation.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    /// One row per sample, one column per feature in schema order.
    pub x: Array2<f64>,
    pub labels: Vec<String>,
}

impl FeatureSchema {
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if features.is_empty() {
            return Err(MachineError::schema("feature schema has no columns"));
        }
        if features.contains(&target) {
            return Err(MachineError::schema(format!(
                "target column '{}' cannot also be a feature",
                target
            )));
        }
        Ok(Self { features, target })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Check a prediction row against the schema and return its features in
    /// schema order. Missing, extra and non-numeric columns are all errors.
    pub fn vectorize(&self, record: &Record) -> Result<Vec<f64>> {
        let missing: Vec<&str> = self
            .features
            .iter()
            .filter(|f| !record.contains_key(f.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(MachineError::prediction(format!(
                "row is missing feature column(s): {}",
                missing.join(", ")
            )));
        }

        let mut extra: Vec<&str> = record
            .keys()
            .filter(|k| !self.features.contains(*k))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            extra.sort_unstable();
            return Err(MachineError::prediction(format!(
                "row has unexpected column(s): {}",
                extra.join(", ")
            )));
        }

        self.features
            .iter()
            .map(|name| {
                let value = &record[name.as_str()];
                value.as_f64().ok_or_else(|| {
                    MachineError::prediction(format!(
                        "column '{}' holds non-numeric {} value '{}'",
                        name,
                        value.kind(),
                        value
                    ))
                })
            })
            .collect()
    }
}

/// Derive the feature schema from `dataset` and validate every cell.
///
/// Fails with `MachineError::Schema` when the dataset is empty, lacks the
/// target column, has no other column, holds a null label, or holds a
/// feature value that cannot be cast to a float. The dataset is not
/// modified.
pub fn extract(dataset: &Dataset, target: &str) -> Result<(FeatureSchema, TrainingTable)> {
    if dataset.is_empty() {
        return Err(MachineError::schema("dataset is empty, cannot train"));
    }
    let target_idx = dataset.column_index(target).ok_or_else(|| {
        MachineError::schema(format!(
            "dataset must contain a '{}' column for supervised training",
            target
        ))
    })?;

    let feature_idx: Vec<usize> = (0..dataset.ncols()).filter(|&i| i != target_idx).collect();
    let features: Vec<String> = feature_idx
        .iter()
        .map(|&i| dataset.columns()[i].clone())
        .collect();
    let schema = FeatureSchema::new(features, target)?;

    let nrows = dataset.len();
    let ncols = feature_idx.len();
    let mut data = Vec::with_capacity(nrows * ncols);
    let mut labels = Vec::with_capacity(nrows);

    for (row_idx, row) in dataset.rows().iter().enumerate() {
        for (&col, name) in feature_idx.iter().zip(schema.features()) {
            let value = &row[col];
            let v = value.as_f64().ok_or_else(|| {
                MachineError::schema(format!(
                    "column '{}' is not numeric: row {} holds {} value '{}'",
                    name,
                    row_idx,
                    value.kind(),
                    value
                ))
            })?;
            data.push(v);
        }
        let label = row[target_idx].to_label().ok_or_else(|| {
            MachineError::schema(format!("row {} has no '{}' label", row_idx, target))
        })?;
        labels.push(label);
    }

    let x = Array2::from_shape_vec((nrows, ncols), data)
        .map_err(|e| MachineError::schema(format!("feature matrix shape: {}", e)))?;

    log::trace!(
        "Extracted {} feature column(s) over {} row(s), target '{}'",
        ncols,
        nrows,
        target
    );

    Ok((schema, TrainingTable { x, labels }))
}
