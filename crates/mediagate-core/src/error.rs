//! Error types module
//!
//! All per-request failures of the ingestion pipeline are unified under
//! [`IngestError`]. Each variant self-describes how it is reported to the user
//! and at which level it is logged through [`ErrorMetadata`].
//!
//! A photo without a face is not an error: it is the `Rejected` outcome.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like unsupported uploads
    Debug,
    /// Warning level - for bad input the user can fix
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - defines how an error is presented to the sender
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether trying the same request again could succeed
    fn is_recoverable(&self) -> bool;

    /// Reply text sent back through the messaging transport
    fn client_message(&self) -> &'static str;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        IngestError::Storage(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, client_message, log_level).
fn ingest_error_static_metadata(err: &IngestError) -> (&'static str, bool, &'static str, LogLevel) {
    use crate::constants::*;

    match err {
        IngestError::Decode(_) => ("DECODE_ERROR", false, REPLY_DECODE_FAILED, LogLevel::Warn),
        IngestError::UnsupportedMimeType(_) => (
            "UNSUPPORTED_MIME_TYPE",
            false,
            REPLY_NOT_AN_IMAGE,
            LogLevel::Debug,
        ),
        IngestError::PayloadTooLarge { .. } => (
            "PAYLOAD_TOO_LARGE",
            false,
            REPLY_DECODE_FAILED,
            LogLevel::Debug,
        ),
        IngestError::Storage(_) => ("STORAGE_ERROR", true, REPLY_STORAGE_FAILED, LogLevel::Error),
        IngestError::Transport(_) => (
            "TRANSPORT_ERROR",
            true,
            REPLY_TRANSPORT_FAILED,
            LogLevel::Error,
        ),
        IngestError::ModelLoad(_) => (
            "MODEL_LOAD_ERROR",
            false,
            REPLY_INTERNAL_ERROR,
            LogLevel::Error,
        ),
        IngestError::Config(_) => ("CONFIG_ERROR", false, REPLY_INTERNAL_ERROR, LogLevel::Error),
        IngestError::Internal(_) => (
            "INTERNAL_ERROR",
            true,
            REPLY_INTERNAL_ERROR,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for IngestError {
    fn error_code(&self) -> &'static str {
        ingest_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        ingest_error_static_metadata(self).1
    }

    fn client_message(&self) -> &'static str {
        ingest_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        ingest_error_static_metadata(self).3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn test_unsupported_mime_type_reply() {
        let err = IngestError::UnsupportedMimeType("application/pdf".to_string());
        assert_eq!(err.client_message(), REPLY_NOT_AN_IMAGE);
        assert_eq!(err.error_code(), "UNSUPPORTED_MIME_TYPE");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_storage_error_reply() {
        let err = IngestError::Storage("disk full".to_string());
        assert_eq!(err.client_message(), REPLY_STORAGE_FAILED);
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_decode_error_is_not_recoverable() {
        let err = IngestError::Decode("not a jpeg".to_string());
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), REPLY_DECODE_FAILED);
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: IngestError = io_err.into();
        assert!(matches!(err, IngestError::Storage(_)));
        assert!(err.to_string().contains("denied"));
    }
}
