//! Shared slot naming.
//!
//! Format: `{category}_message_{user_id}_{n}{extension}`.

use mediagate_core::{MediaCategory, UserId};

use crate::traits::{StorageError, StorageResult};

/// File name of slot `sequence` for the given user and category.
pub fn slot_file_name(category: MediaCategory, user_id: &UserId, sequence: u32) -> String {
    format!(
        "{}_message_{}_{}{}",
        category.as_str(),
        user_id.as_str(),
        sequence,
        category.extension()
    )
}

/// Reject user identifiers that would escape the root directory.
pub fn validate_user_id(user_id: &UserId) -> StorageResult<()> {
    let id = user_id.as_str();

    if id.is_empty() {
        return Err(StorageError::InvalidKey("User id is empty".to_string()));
    }

    if id.contains("..") || id.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(StorageError::InvalidKey(format!(
            "User id contains invalid characters: {:?}",
            id
        )));
    }

    Ok(())
}
