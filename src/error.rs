//! Error types for the crate

use thiserror::Error;

pub use crate::query::error::{QueryError, QueryResult};

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("Failed to access config file {path}: {source}")]
    File {
        /// Path of the config file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// Path of the config file
        path: String,
        /// Parser message
        message: String,
    },

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
