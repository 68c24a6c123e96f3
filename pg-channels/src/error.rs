use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing permissions: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("http status={status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected payload: {0}")]
    Decode(String),

    #[error("gateway error: {0}")]
    Gateway(String),
}

impl PlatformError {
    pub fn from_status(status: u16, context: &str, body: String) -> Self {
        match status {
            401 | 403 => Self::Forbidden(format!("{context}: {body}")),
            404 => Self::NotFound(format!("{context}: {body}")),
            _ => Self::Http { status, body },
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PlatformError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}
