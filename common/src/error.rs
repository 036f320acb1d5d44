use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
//
// Lifecycle and retrieval failures travel through this taxonomy unmodified;
// the API boundary flattens them into a generic failure response.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),
    #[error("Document read error: {0}")]
    DocumentRead(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
