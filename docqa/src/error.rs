use thiserror::Error;

pub const UPLOAD_FAILED: &str = "Upload failed";
pub const LIST_FAILED: &str = "Unable to load files";
pub const START_FAILED: &str = "Processing could not start";
pub const STATUS_FAILED: &str = "Job not found";
pub const CHAT_FAILED: &str = "Chat request failed";

/// Any non-success outcome at the backend boundary.
///
/// Carries only a fixed, operation-specific message. The underlying cause
/// (status code, timeout, undecodable body) is logged where it happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Input rejected locally, before any request is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("No files selected")]
    NoFiles,

    #[error("Limit must be a positive integer")]
    InvalidLimit,

    #[error("top_k must be between 1 and {max}")]
    InvalidTopK { max: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Another request is already in flight")]
    Busy,
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
