use thiserror::Error;
use training::TrainingError;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigFormat(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A task head was paired with a config it cannot serve.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("for validation, model must be in eval mode")]
    NotInEvalMode,

    #[error("batch is missing expected inputs: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error("model output is missing `{0}`")]
    MissingOutput(&'static str),

    #[error(transparent)]
    Loss(#[from] TrainingError),

    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl From<toml::de::Error> for ModelError {
    fn from(value: toml::de::Error) -> Self {
        ModelError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(value: serde_json::Error) -> Self {
        ModelError::ConfigFormat(value.to_string())
    }
}
