use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Backend rejected request (status {status}): {detail}")]
    Backend { status: u16, detail: String },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Column mapping incomplete: missing {}", .missing.join(", "))]
    IncompleteMapping { missing: Vec<&'static str> },

    #[error("Unknown transaction id: {0}")]
    UnknownTransaction(i64),

    #[error("Attribution cannot change once a file is selected")]
    AttributionLocked,

    #[error("A {0} request is already in flight")]
    RequestInFlight(&'static str),

    #[error("Cannot {action} while {stage}")]
    InvalidStage {
        action: &'static str,
        stage: &'static str,
    },

    #[error("Review buffer is empty")]
    EmptyBuffer,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestError {
    /// The backend's `detail` text, when the failure carried one.
    pub fn backend_detail(&self) -> Option<&str> {
        match self {
            IngestError::Backend { detail, .. } if !detail.is_empty() => Some(detail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
