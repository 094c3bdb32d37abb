//! Tipos de erro para o crate clickup
//!
//! Toda falha que sai do núcleo carrega um [`ErrorKind`] de um conjunto fechado.
//! Erros de transporte e status HTTP são classificados uma única vez, na borda
//! do executor ([`crate::rate_limit::RateLimitedExecutor`]), e nunca vazam crus.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Taxonomia fechada de erros expostos aos chamadores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RateLimit,
    NotFound,
    Unauthorized,
    Validation,
    ServerError,
    NetworkError,
    WorkspaceError,
    InvalidParameter,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::WorkspaceError => "WORKSPACE_ERROR",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Apenas RATE_LIMIT é repetido internamente pelo executor
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RateLimit)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Erro do cliente ClickUp
///
/// `details` guarda o contexto necessário para diagnóstico sem trace de rede
/// (task_id, field_id, endpoint, ECODE da API...).
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}")]
pub struct ClickUpError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub details: BTreeMap<String, String>,
}

impl ClickUpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            details: BTreeMap::new(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn workspace(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WorkspaceError, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Anexa contexto (ids envolvidos) ao erro
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(|s| s.as_str())
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == ErrorKind::RateLimit
    }
}

impl From<serde_json::Error> for ClickUpError {
    fn from(err: serde_json::Error) -> Self {
        ClickUpError::unknown(format!("JSON parsing failed: {}", err))
    }
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, ClickUpError>;

// ============================================================================
// Classificador
// ============================================================================

/// Falha de transporte antes de qualquer resposta HTTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout(String),
    Connect(String),
    Body(String),
    Other(String),
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        let msg = err.to_string();
        if err.is_timeout() {
            TransportFailure::Timeout(msg)
        } else if err.is_connect() {
            TransportFailure::Connect(msg)
        } else if err.is_body() || err.is_decode() {
            TransportFailure::Body(msg)
        } else {
            TransportFailure::Other(msg)
        }
    }
}

/// Classifica uma falha de transporte
pub fn classify_transport(failure: &TransportFailure) -> ClickUpError {
    match failure {
        TransportFailure::Timeout(msg) => {
            ClickUpError::network(format!("Request timed out: {}", msg))
        }
        TransportFailure::Connect(msg) => {
            ClickUpError::network(format!("Connection failed: {}", msg))
        }
        TransportFailure::Other(msg) => {
            ClickUpError::network(format!("HTTP request failed: {}", msg))
        }
        TransportFailure::Body(msg) => {
            ClickUpError::unknown(format!("Failed to read response body: {}", msg))
        }
    }
}

/// Classifica uma resposta HTTP não-2xx
///
/// O corpo de erro do ClickUp tem o formato `{"err": "...", "ECODE": "..."}`;
/// a mensagem e o código são extraídos quando presentes.
pub fn classify_status(status: u16, body: &str) -> ClickUpError {
    let (message, ecode) = parse_error_body(body);
    let message_lower = message.to_lowercase();
    let ecode_upper = ecode.clone().unwrap_or_default().to_uppercase();

    let kind = match status {
        429 => ErrorKind::RateLimit,
        401 | 403 => ErrorKind::Unauthorized,
        _ if ecode_upper.starts_with("OAUTH_") => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        400 | 422 => {
            if ecode_upper.starts_with("TEAM_") || mentions_workspace(&message_lower) {
                ErrorKind::WorkspaceError
            } else {
                ErrorKind::Validation
            }
        }
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Unknown,
    };

    let mut error = ClickUpError::new(kind, message).with_status(status);
    if let Some(code) = ecode {
        error = error.with_detail("ecode", code);
    }
    error
}

/// "team"/"workspace" como palavra inteira ("steam" e "teammate" não contam)
fn mentions_workspace(message_lower: &str) -> bool {
    message_lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| matches!(word, "team" | "teams" | "workspace" | "workspaces"))
}

fn parse_error_body(body: &str) -> (String, Option<String>) {
    let fallback = if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.to_string()
    };

    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let message = json
                .get("err")
                .or_else(|| json.get("error"))
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or(fallback);
            let ecode = json
                .get("ECODE")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            (message, ecode)
        }
        Err(_) => (fallback, None),
    }
}
