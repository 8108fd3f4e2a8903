//! Directory error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("visitor not found: {0}")]
    NotFound(String),
    #[error("directory unreachable: {0}")]
    Transport(String),
    #[error("directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode directory response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DirectoryError::Decode(err.to_string())
        } else {
            DirectoryError::Transport(err.to_string())
        }
    }
}
