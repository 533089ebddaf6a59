use thiserror::Error;

/// Errors raised by the rarity classifier.
///
/// Every variant is returned at the point of violation. Nothing is retried
/// and nothing is logged on the caller's behalf.
#[derive(Debug, Error)]
pub enum MachineError {
    /// Malformed dataset or row shape (empty dataset, missing target,
    /// non-numeric feature cell).
    #[error("schema error: {0}")]
    Schema(String),

    /// Label codec misuse (re-fit, unknown label, out-of-range code).
    #[error("codec error: {0}")]
    Codec(String),

    /// Not enough rows or classes to fit a meaningful model, or an
    /// unusable training configuration.
    #[error("training error: {0}")]
    Training(String),

    /// Prediction input does not match the trained feature schema.
    #[error("prediction error: {0}")]
    Prediction(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Failure modes when reading or writing a serialized machine.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("not a machine artifact (bad magic bytes)")]
    BadMagic,

    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("artifact truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("artifact corrupt: {0}")]
    Corrupt(String),

    #[error("failed to encode machine: {0}")]
    Encode(String),

    #[error("i/o failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MachineError>;

impl MachineError {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        MachineError::Schema(msg.into())
    }

    pub(crate) fn codec(msg: impl Into<String>) -> Self {
        MachineError::Codec(msg.into())
    }

    pub(crate) fn training(msg: impl Into<String>) -> Self {
        MachineError::Training(msg.into())
    }

    pub(crate) fn prediction(msg: impl Into<String>) -> Self {
        MachineError::Prediction(msg.into())
    }
}
