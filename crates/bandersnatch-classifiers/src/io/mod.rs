//! Readers that turn exported monster collections into a `Dataset`.
pub mod csv_table;
pub mod json_records;

pub use csv_table::{parse_cell, read_csv, read_csv_from_reader, read_csv_with_config, CsvReaderConfig};
pub use json_records::{parse_json_records, read_json_records};
