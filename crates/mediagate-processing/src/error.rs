use mediagate_core::IngestError;

use crate::validator::ValidationError;

/// Errors raised by the processing stages
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::Decode(err.to_string())
    }
}

impl From<ProcessingError> for IngestError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Decode(msg) => IngestError::Decode(msg),
            ProcessingError::Validation(ValidationError::FileTooLarge { size, max }) => {
                IngestError::PayloadTooLarge { size, max }
            }
            ProcessingError::Validation(ValidationError::InvalidContentType {
                content_type,
                ..
            }) => IngestError::UnsupportedMimeType(content_type),
            ProcessingError::Validation(ValidationError::EmptyFile) => {
                IngestError::Decode("Empty file".to_string())
            }
            ProcessingError::ModelLoad(msg) => IngestError::ModelLoad(msg),
            ProcessingError::Inference(msg) => IngestError::Internal(msg),
            ProcessingError::Encode(msg) => IngestError::Internal(msg),
        }
    }
}
