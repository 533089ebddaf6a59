//! bandersnatch-classifiers: rarity classification for the Bandersnatch
//! monster lab.
//!
//! The crate turns a labeled monster table into a trained random forest
//! (`machine::Machine`) with a frozen feature schema and label codec,
//! answers single-row predictions with a confidence score, and saves or
//! loads the whole trained unit through a versioned byte format. Dataset
//! readers and small HTML renderers cover the hand-off to and from the
//! surrounding web app.
pub mod codec;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod forest;
pub mod io;
pub mod machine;
pub mod persistence;
pub mod report;
pub mod schema;

pub use config::{ForestConfig, MaxFeatures, TrainConfig};
pub use data_handling::{record, Dataset, Record, Value};
pub use error::{MachineError, PersistenceError, Result};
pub use machine::{Machine, ModelSummary, Prediction, TrainingMetadata};
