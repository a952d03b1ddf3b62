use thiserror::Error;

/// Failures surfaced to the host as signals. None of these are ever returned
/// from a host-facing call; they arrive through [`crate::SyncEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The connection could not be established or was dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame could not be decoded; only that frame was discarded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reconnection attempts are exhausted. Only a new `connect()` recovers.
    #[error("gave up after {attempts} reconnection attempts")]
    PermanentFailure { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a json object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("match state carries no match id")]
    MissingMatchId,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("connection attempt timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid origin url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported origin scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("origin has no host")]
    MissingHost,

    #[error("origin `{0}` must not carry a path, query or fragment")]
    UnexpectedPath(String),
}

impl From<ParseError> for SyncError {
    fn from(err: ParseError) -> Self {
        SyncError::Parse(err.to_string())
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::Transport(err.to_string())
    }
}
