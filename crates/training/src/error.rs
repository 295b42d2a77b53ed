use std::fmt;

#[derive(Debug)]
pub enum TrainingError {
    Validation(Vec<String>),
    Initialization(String),
    Runtime(String),
}

impl TrainingError {
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn validation(messages: Vec<String>) -> Self {
        Self::Validation(messages)
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingError::Validation(messages) => {
                write!(f, "invalid arguments: {}", messages.join("; "))
            }
            TrainingError::Initialization(msg) => {
                write!(f, "initialization failed: {}", msg)
            }
            TrainingError::Runtime(msg) => write!(f, "computation failed: {}", msg),
        }
    }
}

impl std::error::Error for TrainingError {}

impl From<candle_core::Error> for TrainingError {
    fn from(value: candle_core::Error) -> Self {
        TrainingError::Runtime(value.to_string())
    }
}
