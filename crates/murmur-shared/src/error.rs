use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame has no event name")]
    MissingEventName,

    #[error("Unknown realtime event: {0}")]
    UnknownEvent(String),
}
