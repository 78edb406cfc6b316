use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum LockError {
    #[error("Failed to connect to xAPI: {0}")]
    ConnectionFailed(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("xAPI connection closed")]
    ConnectionClosed,

    #[error("xAPI request timed out: {0}")]
    RequestTimeout(String),

    #[error("xAPI error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected xAPI response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid settings menu mode: {0}")]
    InvalidLockState(String),

    #[error("Icon download failed: {0}")]
    IconDownloadFailed(String),

    #[error(transparent)]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LockError>;
