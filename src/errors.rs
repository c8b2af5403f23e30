use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Frame source error: {0}")]
    SourceError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Segment open failed: {0}")]
    SegmentOpenFailed(String),
    #[error("Segment already open: {0}")]
    SegmentAlreadyOpen(String),
    #[error("Segment is not open: {0}")]
    SegmentClosed(String),
    #[error("Segment write failed: {0}")]
    SegmentWriteFailed(String),
    #[error("Segment finalize failed: {0}")]
    SegmentFinalizeFailed(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl WatchError {
    /// Short stable label for the error kind, used in logs and run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            WatchError::SourceError(_) => "source-error",
            WatchError::ConfigError(_) => "config-error",
            WatchError::SegmentOpenFailed(_) => "segment-open-failed",
            WatchError::SegmentAlreadyOpen(_) => "segment-already-open",
            WatchError::SegmentClosed(_) => "segment-closed",
            WatchError::SegmentWriteFailed(_) => "segment-write-failed",
            WatchError::SegmentFinalizeFailed(_) => "segment-finalize-failed",
            WatchError::EncodingError(_) => "encoding-error",
            WatchError::Unsupported(_) => "unsupported",
            WatchError::IoError(_) => "io-error",
        }
    }
}

impl From<std::io::Error> for WatchError {
    fn from(e: std::io::Error) -> Self {
        WatchError::IoError(e.to_string())
    }
}
