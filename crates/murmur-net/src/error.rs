use thiserror::Error;

/// Errors produced by the REST client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend answered with a non-success status.  `message` is the
    /// `message` field of the JSON error body, when there was one.
    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    /// 401 from the backend (no or expired session).
    #[error("Unauthorized: {}", .message.as_deref().unwrap_or("no session"))]
    Unauthorized { message: Option<String> },

    /// Network failure, timeout or an unreachable backend.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Human-readable message supplied by the backend, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message, .. } | ApiError::Unauthorized { message } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

/// Errors produced while opening the realtime channel.
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Invalid realtime URL: {0}")]
    Url(#[from] url::ParseError),
}
