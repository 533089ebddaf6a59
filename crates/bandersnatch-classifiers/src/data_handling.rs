//! Tabular dataset types consumed by the classifier.
//!
//! A `Dataset` mirrors what the document store hands over: named columns and
//! rows of loosely typed scalar cells. Nothing here coerces cells to numbers;
//! that happens in an explicit validation pass in `schema`.
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MachineError, Result};

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell, or `None` when it cannot be cast to a
    /// finite float.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Value::Null => return None,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }

    /// String form used as a class label. `Null` has no label.
    pub fn to_label(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One prediction row: column name to cell. Column order is irrelevant.
pub type Record = HashMap<String, Value>;

/// Build a `Record` from `(name, value)` pairs.
pub fn record<K, V, I>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Ordered columns plus row-major cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Create a dataset, checking that column names are unique and that
    /// every row carries one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(MachineError::schema(format!("duplicate column '{}'", name)));
            }
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(MachineError::schema(format!(
                "row {} has {} cells but the dataset has {} columns",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a dataset from name/value records, the shape documents come
    /// out of the store in. Columns appear in order of first occurrence;
    /// cells a record does not carry are `Null`.
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sparse: Vec<Vec<(usize, Value)>> = Vec::new();

        for rec in records {
            let mut cells = Vec::new();
            for (key, value) in rec {
                let key = key.into();
                let col = match index.get(&key) {
                    Some(&col) => col,
                    None => {
                        let col = columns.len();
                        index.insert(key.clone(), col);
                        columns.push(key);
                        col
                    }
                };
                cells.push((col, value));
            }
            sparse.push(cells);
        }

        let width = columns.len();
        let rows = sparse
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Null; width];
                for (col, value) in cells {
                    row[col] = value;
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Row `i` as a `Record`.
    pub fn record(&self, i: usize) -> Option<Record> {
        let row = self.rows.get(i)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.rows.len()).filter_map(move |i| self.record(i))
    }

    /// Keep only `names`, in the given order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Dataset> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| MachineError::schema(format!("unknown column '{}'", name)))
            })
            .collect::<Result<Vec<usize>>>()?;
        let columns = names.iter().map(|s| s.to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Dataset::new(columns, rows)
    }

    /// Remove `names`; names that are not present are ignored.
    pub fn drop_columns(&self, names: &[&str]) -> Dataset {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i].as_str()))
            .collect();
        Dataset {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_numeric_coercion() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(Value::from("Dragon").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::Float(f64::NAN).as_f64(), None);
    }

    #[test]
    fn value_labels() {
        assert_eq!(Value::from("Rare").to_label().as_deref(), Some("Rare"));
        assert_eq!(Value::Int(3).to_label().as_deref(), Some("3"));
        assert_eq!(Value::Null.to_label(), None);
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let res = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3)]],
        );
        assert!(matches!(res, Err(MachineError::Schema(_))));
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        let res = Dataset::new(vec!["a".into(), "a".into()], vec![]);
        assert!(matches!(res, Err(MachineError::Schema(_))));
    }

    #[test]
    fn from_records_keeps_first_seen_order_and_fills_nulls() {
        let ds = Dataset::from_records(vec![
            vec![("Level", Value::Int(1)), ("Rarity", Value::from("Common"))],
            vec![("Health", Value::Int(5)), ("Level", Value::Int(2))],
        ]);
        assert_eq!(ds.columns(), &["Level", "Rarity", "Health"]);
        assert_eq!(ds.rows()[0][2], Value::Null);
        assert_eq!(ds.rows()[1][1], Value::Null);
        assert_eq!(ds.rows()[1][0], Value::Int(2));
    }

    #[test]
    fn drop_and_select_columns() {
        let ds = Dataset::from_records(vec![vec![
            ("Name", Value::from("Grue")),
            ("Level", Value::Int(4)),
            ("Rarity", Value::from("Rank 1")),
        ]]);
        let dropped = ds.drop_columns(&["Name", "Missing"]);
        assert_eq!(dropped.columns(), &["Level", "Rarity"]);

        let selected = ds.select_columns(&["Rarity", "Level"]).unwrap();
        assert_eq!(selected.rows()[0], vec![Value::from("Rank 1"), Value::Int(4)]);
        assert!(ds.select_columns(&["Nope"]).is_err());
    }
}
