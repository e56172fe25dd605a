use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by server: {0}")]
    Validation(String),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Could not read server response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the user can recover by triggering the same action again.
    /// `NotFound` is recoverable by refreshing the analysis first.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::Validation(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Network(_) => "Could not reach the portal. Check your connection and try again.".to_string(),
            RemoteError::NotFound(msg) => format!("{} Refresh the analysis and try again.", msg),
            RemoteError::Validation(msg) => msg.clone(),
            RemoteError::Server { message, .. } => message.clone(),
            RemoteError::Decode(_) => "The portal sent an unexpected response. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Operation not allowed: {0}")]
    Precondition(&'static str),
}
