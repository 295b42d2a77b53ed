use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage driver '{provider}' is not available. {hint}")]
    DriverUnavailable { provider: String, hint: String },

    #[error("container '{0}' does not exist")]
    ContainerDoesNotExist(String),

    #[error("object '{object}' does not exist in container '{container}'")]
    ObjectDoesNotExist { container: String, object: String },

    #[error("destination {} already exists; pass overwrite_existing to replace it", .0.display())]
    ObjectAlreadyExists(PathBuf),

    #[error("invalid object name '{0}'")]
    InvalidObjectName(String),

    #[error("hash mismatch for '{object}': expected {expected}, got {actual}")]
    HashMismatch {
        object: String,
        expected: String,
        actual: String,
    },

    #[error("size mismatch for '{object}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        object: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid driver options: {0}")]
    InvalidOptions(String),

    #[error("failed to parse config: {0}")]
    ConfigFormat(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by a third-party driver, passed through untouched.
    #[error("{0}")]
    Driver(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Driver(Box::new(err))
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(value: toml::de::Error) -> Self {
        StoreError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::ConfigFormat(value.to_string())
    }
}
