//! Storage abstraction trait
//!
//! This module defines the MediaStore trait the ingestion pipeline writes through.

use async_trait::async_trait;
use mediagate_core::{IngestError, MediaCategory, UserId};
use thiserror::Error;

use crate::slot::StorageSlot;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Storage root unavailable: {0}")]
    RootUnavailable(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::Storage(err.to_string())
    }
}

/// Storage abstraction trait
///
/// Implementations own one root directory per category and guarantee that a stored
/// item never replaces an existing file.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Compute the next free slot without writing anything.
    async fn next_slot(
        &self,
        user_id: &UserId,
        category: MediaCategory,
    ) -> StorageResult<StorageSlot>;

    /// Write `data` into the next free slot and return the slot that was taken.
    async fn store(
        &self,
        user_id: &UserId,
        category: MediaCategory,
        data: Vec<u8>,
    ) -> StorageResult<StorageSlot>;
}
