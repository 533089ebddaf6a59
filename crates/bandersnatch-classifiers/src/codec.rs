use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{MachineError, Result};

/// Bijection between string class labels and dense codes `0..K`.
///
/// Codes follow ascending byte-wise order of the label strings, so the
/// mapping does not depend on row order. A codec is fitted exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCodec {
    classes: Option<Vec<String>>,
}

impl LabelCodec {
    pub fn new() -> Self {
        Self { classes: None }
    }

    /// Fit on `labels` and return the code of each one.
    pub fn fit<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<Vec<usize>> {
        if self.classes.is_some() {
            return Err(MachineError::codec("label codec is already fitted"));
        }
        let distinct: BTreeSet<&str> = labels.iter().map(|s| s.as_ref()).collect();
        let classes: Vec<String> = distinct.into_iter().map(str::to_string).collect();

        let codes = labels
            .iter()
            .map(|label| {
                classes
                    .binary_search_by(|c| c.as_str().cmp(label.as_ref()))
                    .map_err(|_| MachineError::codec(format!("label '{}' vanished during fit", label.as_ref())))
            })
            .collect::<Result<Vec<usize>>>()?;

        self.classes = Some(classes);
        Ok(codes)
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        let classes = self.fitted()?;
        classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| MachineError::codec(format!("unknown label '{}'", label)))
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        let classes = self.fitted()?;
        classes.get(code).map(String::as_str).ok_or_else(|| {
            MachineError::codec(format!(
                "class code {} out of range [0, {}]",
                code,
                classes.len().saturating_sub(1)
            ))
        })
    }

    /// Known labels in code order; empty before fitting.
    pub fn classes(&self) -> &[String] {
        self.classes.as_deref().unwrap_or(&[])
    }

    pub fn n_classes(&self) -> usize {
        self.classes().len()
    }

    pub fn is_fitted(&self) -> bool {
        self.classes.is_some()
    }

    fn fitted(&self) -> Result<&[String]> {
        self.classes
            .as_deref()
            .ok_or_else(|| MachineError::codec("label codec has not been fitted"))
    }
}
