// src/utils/error.rs
use thiserror::Error;

// Errors are split per layer; AppError is what main sees.
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("SEC Rate limit likely exceeded")]
    RateLimited,

    #[error("Could not find filing index for CIK {0}")]
    IndexNotFound(String),

    #[error("Could not find specified filing: {0}")]
    FilingDocNotFound(String),

    #[error("Failed to parse EDGAR response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The filing text was blank. The only condition the cascade surfaces as a hard error.
    #[error("Filing document is empty")]
    EmptyDocument,

    /// A delimited information table was found but is not well-formed XML.
    #[error("Structural parse error: {0}")]
    StructuralParse(String),

    /// The row could not be decomposed into issuer / class / CUSIP / remainder.
    #[error("Row parse failure: {0}")]
    RowParse(String),
}

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("Model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model API error: {0}")]
    Api(String),

    #[error("Could not decode model output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Model fallback not configured: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EDGAR interaction failed: {0}")]
    Edgar(#[from] EdgarError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Model fallback failed: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
