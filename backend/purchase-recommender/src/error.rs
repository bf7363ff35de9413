use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

