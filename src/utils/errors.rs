use thiserror::Error;

/// Main error type for Ragline
#[derive(Error, Debug)]
pub enum RaglineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RaglineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RaglineError::Decode(err.to_string())
        } else {
            RaglineError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RaglineError>;
