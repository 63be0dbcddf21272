use thiserror::Error;

/// Errors raised by the durable node tier.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the chat platform collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Missing permission: {0}")]
    Forbidden(String),

    #[error("Platform rate limit hit")]
    RateLimited,

    #[error("Platform request timed out")]
    Timeout,

    #[error("Platform transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
