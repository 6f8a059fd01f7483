use thiserror::Error;

/// Classified failures of the message write and read paths.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The content type has no entry in the message type registry.
    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    /// The video source has no entry in the video source registry.
    #[error("unknown video source: {0:?}")]
    UnknownVideoSource(String),

    /// The store failed; the transaction was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailed(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for MessageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::TransactionFailed(e.into())
    }
}
