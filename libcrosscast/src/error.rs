//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request to {module} failed with status {status}: {body}")]
    Request {
        module: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected failure in {module}: {message}")]
    Caught { module: String, message: String },

    #[error("Failed to create post via {}", modules.join(", "))]
    Fanout { status: u16, modules: Vec<String> },
}

impl CrosscastError {
    /// HTTP status the error maps to when reported to a caller.
    pub fn status(&self) -> u16 {
        match self {
            CrosscastError::Validation(_) => 400,
            CrosscastError::Unauthorized(_) => 401,
            CrosscastError::NotFound(_) => 404,
            CrosscastError::Request { status, .. } => *status,
            CrosscastError::Fanout { status, .. } => *status,
            CrosscastError::Caught { .. } => 500,
            CrosscastError::Config(_) => 500,
            CrosscastError::Storage(_) => 500,
        }
    }

    /// Name of the module the failure originated in, when one is attached.
    pub fn module(&self) -> Option<&str> {
        match self {
            CrosscastError::Request { module, .. } => Some(module),
            CrosscastError::Caught { module, .. } => Some(module),
            _ => None,
        }
    }

    /// Wrap an arbitrary local failure (serialization, transport) with the
    /// module it happened in.
    pub fn caught(module: &str, error: impl std::fmt::Display) -> Self {
        CrosscastError::Caught {
            module: module.to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Payload serialization failed: {0}")]
    PayloadError(#[from] serde_json::Error),
}

impl From<sqlx::Error> for CrosscastError {
    fn from(e: sqlx::Error) -> Self {
        CrosscastError::Storage(StoreError::SqlxError(e))
    }
}

impl From<serde_json::Error> for CrosscastError {
    fn from(e: serde_json::Error) -> Self {
        CrosscastError::Storage(StoreError::PayloadError(e))
    }
}
