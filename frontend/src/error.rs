use shared::ValidationError;
use thiserror::Error;

/// Why a call to the task API did not produce the expected value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("HTTP {status}")]
    Http {
        status: u16,
        /// The `error` field of the response body, when there was one.
        message: Option<String>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text meant for the user, if the server or validation produced one.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ClientError::Validation(err) => Some(err.to_string()),
            ClientError::Http { message, .. } => message.clone(),
            ClientError::Network(_) | ClientError::Decode(_) => None,
        }
    }
}
