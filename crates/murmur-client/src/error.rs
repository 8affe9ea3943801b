use thiserror::Error;

use murmur_net::{ApiError, RealtimeError};
use murmur_shared::constants::GENERIC_ERROR_MESSAGE;
use murmur_shared::types::MessageId;

/// Errors surfaced by the stores to their callers.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No conversation selected")]
    NoActiveConversation,

    #[error("Message has neither text nor image")]
    EmptyMessage,

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Message cannot be modified: {0}")]
    NotEditable(MessageId),
}

impl ClientError {
    /// Text for a user-facing notification: the backend's own message when
    /// it sent one, a generic fallback for other remote failures.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api(e) => e
                .backend_message()
                .unwrap_or(GENERIC_ERROR_MESSAGE)
                .to_string(),
            ClientError::Realtime(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
