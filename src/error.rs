use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// Everything here is unrecoverable at the point of detection and propagates up to
// whoever started the evolutionary run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no fitness cases to evaluate against")]
    NoFitnessCases,

    #[error("fitness case type mismatch: {0}")]
    TypeMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
