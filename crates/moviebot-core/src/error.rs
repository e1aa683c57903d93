use thiserror::Error;

/// Configuration errors raised while building vocabularies or encoding intents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Vocabulary must contain at least one label")]
    EmptyVocabulary,
    #[error("Label {label:?} is not part of the vocabulary")]
    UnknownLabel { label: String },
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid policy configuration: {0}")]
    Config(String),
    #[error("Input vector has length {actual}, expected {expected}")]
    Dimension { expected: usize, actual: usize },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("Policy file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Policy snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Malformed policy snapshot: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
