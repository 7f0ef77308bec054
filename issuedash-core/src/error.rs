//! Error types for issuedash-core

use thiserror::Error;

/// Main error type for the issuedash-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or self-contradictory dashboard definition
    #[error("configuration error: {0}")]
    Config(String),

    /// A template expression or script failed during execution
    #[error("expression error: {0}")]
    Expr(String),

    /// Malformed date expression
    #[error("date parse error: {0}")]
    Date(String),

    /// Query execution error (unknown type, malformed query)
    #[error("query error: {0}")]
    Query(String),

    /// Error surfaced from the issue-tracker client, unchanged
    #[error("tracker error: {0}")]
    Tracker(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for issuedash-core
pub type Result<T> = std::result::Result<T, Error>;
