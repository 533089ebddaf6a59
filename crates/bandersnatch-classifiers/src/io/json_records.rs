//! Reader for JSON arrays of flat documents, the shape a document-store
//! export of the monster collection takes.
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Map;

use crate::data_handling::{Dataset, Value};

/// Store-internal key dropped from every document.
const DOCUMENT_ID_KEY: &str = "_id";

pub fn read_json_records<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read records: {}", path.as_ref().display()))?;
    parse_json_records(&content)
        .with_context(|| format!("Failed to parse records: {}", path.as_ref().display()))
}

/// Parse `[{...}, {...}]` into a dataset. Columns follow the order in which
/// keys first appear; nested arrays or objects are rejected.
pub fn parse_json_records(content: &str) -> Result<Dataset> {
    let docs: Vec<Map<String, serde_json::Value>> =
        serde_json::from_str(content).context("Expected a JSON array of objects")?;

    let mut records = Vec::with_capacity(docs.len());
    for (row_idx, doc) in docs.into_iter().enumerate() {
        let mut record = Vec::with_capacity(doc.len());
        for (key, value) in doc {
            if key == DOCUMENT_ID_KEY {
                continue;
            }
            let cell = to_cell(value)
                .ok_or_else(|| anyhow!("Nested value in column '{}' at row {}", key, row_idx + 1))?;
            record.push((key, cell));
        }
        records.push(record);
    }

    let dataset = Dataset::from_records(records);
    log::debug!(
        "Parsed {} documents into {} columns",
        dataset.len(),
        dataset.ncols()
    );
    Ok(dataset)
}

fn to_cell(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::Text(s)),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}
