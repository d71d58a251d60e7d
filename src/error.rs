use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No statement documents were provided")]
    NoDocuments,

    #[error("Unknown period mode '{0}': expected mensal, trimestral or anual")]
    InvalidPeriodMode(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
