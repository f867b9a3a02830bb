use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod retrieval;
pub mod store;
