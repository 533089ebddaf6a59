//! Delimited-text reader for monster tables.
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::data_handling::{Dataset, Value};

/// Configuration for reading CSV/TSV exports.
#[derive(Debug, Clone)]
pub struct CsvReaderConfig {
    pub delimiter: u8,
    /// When false, columns are named `column_0`, `column_1`, ...
    pub has_headers: bool,
    /// Optional list of columns to load (in order). When `None`, every
    /// column not in `ignore_columns` is loaded.
    pub columns: Option<Vec<String>>,
    pub ignore_columns: Vec<String>,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            columns: None,
            ignore_columns: vec!["_id".to_string()],
        }
    }
}

impl CsvReaderConfig {
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

/// Read a comma-separated file with a header row.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_csv_with_config(path, &CsvReaderConfig::default())
}

pub fn read_csv_with_config<P: AsRef<Path>>(path: P, config: &CsvReaderConfig) -> Result<Dataset> {
    let file = std::fs::File::open(&path)
        .with_context(|| format!("Failed to open table: {}", path.as_ref().display()))?;
    read_csv_from_reader(file, config)
        .with_context(|| format!("Failed to read table: {}", path.as_ref().display()))
}

/// Same as `read_csv_with_config`, from any reader.
pub fn read_csv_from_reader<R: Read>(rdr: R, config: &CsvReaderConfig) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.has_headers)
        .from_reader(rdr);

    let header_row: Option<Vec<String>> = if config.has_headers {
        let headers = reader.headers().context("Failed to read header row")?;
        Some(headers.iter().map(|h| h.trim().to_string()).collect())
    } else {
        None
    };

    let mut records: Vec<StringRecord> = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        records.push(result.with_context(|| format!("Failed to read row {}", row_idx + 1))?);
    }

    let headers = header_row.unwrap_or_else(|| {
        let width = records.first().map_or(0, StringRecord::len);
        (0..width).map(|i| format!("column_{}", i)).collect()
    });

    let indices = resolve_column_indices(&headers, config)?;
    let columns: Vec<String> = indices.iter().map(|&i| headers[i].clone()).collect();

    let mut rows = Vec::with_capacity(records.len());
    for (row_idx, record) in records.iter().enumerate() {
        if record.len() != headers.len() {
            return Err(anyhow!(
                "Row {} has {} fields, header has {}",
                row_idx + 1,
                record.len(),
                headers.len()
            ));
        }
        rows.push(indices.iter().map(|&i| parse_cell(&record[i])).collect::<Vec<Value>>());
    }

    log::debug!("Read {} rows x {} columns", rows.len(), columns.len());
    Dataset::new(columns, rows).map_err(|e| anyhow!(e))
}

fn resolve_column_indices(headers: &[String], config: &CsvReaderConfig) -> Result<Vec<usize>> {
    if let Some(names) = &config.columns {
        return names
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| anyhow!("Missing column '{}'", name))
            })
            .collect();
    }
    let ignore: HashSet<&str> = config.ignore_columns.iter().map(String::as_str).collect();
    Ok((0..headers.len())
        .filter(|&i| !ignore.contains(headers[i].as_str()))
        .collect())
}

/// Type a raw text cell: empty → `Null`, then integer, float, boolean,
/// otherwise text.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    match s.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cell_types() {
        assert_eq!(parse_cell("42"), Value::Int(42));
        assert_eq!(parse_cell(" 4.5 "), Value::Float(4.5));
        assert_eq!(parse_cell("TRUE"), Value::Bool(true));
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("Rank 3"), Value::from("Rank 3"));
    }

    #[test]
    fn reads_headers_and_skips_mongo_id() {
        let data = "_id,Level,Rarity\nabc,3,Common\ndef,9,Rare\n";
        let ds = read_csv_from_reader(data.as_bytes(), &CsvReaderConfig::default()).unwrap();
        assert_eq!(ds.columns(), &["Level", "Rarity"]);
        assert_eq!(ds.rows()[1], vec![Value::Int(9), Value::from("Rare")]);
    }

    #[test]
    fn headerless_tsv_keeps_first_row() {
        let config = CsvReaderConfig {
            has_headers: false,
            ..CsvReaderConfig::tsv()
        };
        let ds = read_csv_from_reader("1\tA\n2\tB\n".as_bytes(), &config).unwrap();
        assert_eq!(ds.columns(), &["column_0", "column_1"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[0][0], Value::Int(1));
    }

    #[test]
    fn explicit_columns_must_exist() {
        let config = CsvReaderConfig {
            columns: Some(vec!["Sanity".to_string()]),
            ..CsvReaderConfig::default()
        };
        assert!(read_csv_from_reader("Level\n1\n".as_bytes(), &config).is_err());
    }
}
