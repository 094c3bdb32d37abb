use clickup::{ClickUpError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("ClickUp API error: {0}")]
    ClickUpApi(#[from] ClickUpError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl AppError {
    /// Classificação do núcleo, quando o erro veio do ClickUp
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::ClickUpApi(err) => Some(err.kind),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
