//! Error types for the project store

use thiserror::Error;

/// Project store error type
#[derive(Error, Debug)]
pub enum Error {
    /// Store has not been initialized yet
    #[error("Project store is not ready")]
    NotReady,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed record key
    #[error("Invalid record key: {0}")]
    InvalidKey(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
