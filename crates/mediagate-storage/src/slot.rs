//! Slot allocation.
//!
//! [`SlotAllocator::next_slot`] probes `n = 1, 2, ...` and returns the first slot whose
//! file does not exist. It never writes; under a single writer the occupied numbers
//! for one (root, user, category) stay contiguous from 1.

use std::path::{Path, PathBuf};

use mediagate_core::{MediaCategory, UserId};
use tokio::fs;

use crate::keys::{slot_file_name, validate_user_id};
use crate::traits::{StorageError, StorageResult};

/// A concrete file location for one stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSlot {
    pub root: PathBuf,
    pub user_id: UserId,
    pub category: MediaCategory,
    /// Always `>= 1`.
    pub sequence: u32,
}

impl StorageSlot {
    pub fn extension(&self) -> &'static str {
        self.category.extension()
    }

    pub fn file_name(&self) -> String {
        slot_file_name(self.category, &self.user_id, self.sequence)
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.file_name())
    }

    /// The slot right after this one.
    pub fn next(&self) -> StorageSlot {
        StorageSlot {
            sequence: self.sequence + 1,
            ..self.clone()
        }
    }
}

/// Computes free slots under one root directory.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    root: PathBuf,
}

impl SlotAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the first slot whose file does not exist under the root.
    ///
    /// Fails with [`StorageError::RootUnavailable`] if the root is missing or is not a
    /// directory, and with [`StorageError::InvalidKey`] for unsafe user ids.
    pub async fn next_slot(
        &self,
        user_id: &UserId,
        category: MediaCategory,
    ) -> StorageResult<StorageSlot> {
        validate_user_id(user_id)?;

        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::RootUnavailable(format!("{}: {}", self.root.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::RootUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let mut slot = StorageSlot {
            root: self.root.clone(),
            user_id: user_id.clone(),
            category,
            sequence: 1,
        };

        while fs::try_exists(slot.path()).await? {
            slot = slot.next();
        }

        tracing::debug!(
            root = %self.root.display(),
            user_id = %user_id,
            category = %category,
            sequence = slot.sequence,
            "Allocated storage slot"
        );

        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, name: &str) {
        std::fs::write(root.join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_empty_directory_starts_at_one() {
        let dir = tempdir().unwrap();
        let allocator = SlotAllocator::new(dir.path());

        let slot = allocator
            .next_slot(&UserId::from(7_i64), MediaCategory::Photo)
            .await
            .unwrap();

        assert_eq!(slot.sequence, 1);
        assert_eq!(slot.path(), dir.path().join("photo_message_7_1.jpg"));
    }

    #[tokio::test]
    async fn test_next_after_existing_files() {
        let dir = tempdir().unwrap();
        for n in 1..=4 {
            touch(dir.path(), &format!("audio_message_7_{}.wav", n));
        }
        let allocator = SlotAllocator::new(dir.path());

        let slot = allocator
            .next_slot(&UserId::from(7_i64), MediaCategory::Audio)
            .await
            .unwrap();

        assert_eq!(slot.sequence, 5);
        assert_eq!(slot.file_name(), "audio_message_7_5.wav");
    }

    #[tokio::test]
    async fn test_next_slot_is_pure() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "photo_message_7_1.jpg");
        let allocator = SlotAllocator::new(dir.path());
        let user = UserId::from(7_i64);

        let first = allocator
            .next_slot(&user, MediaCategory::Photo)
            .await
            .unwrap();
        let second = allocator
            .next_slot(&user, MediaCategory::Photo)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.sequence, 2);
    }

    #[tokio::test]
    async fn test_users_and_categories_are_independent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "photo_message_7_1.jpg");
        touch(dir.path(), "photo_message_7_2.jpg");
        let allocator = SlotAllocator::new(dir.path());

        let other_user = allocator
            .next_slot(&UserId::from(8_i64), MediaCategory::Photo)
            .await
            .unwrap();
        let other_category = allocator
            .next_slot(&UserId::from(7_i64), MediaCategory::Audio)
            .await
            .unwrap();

        assert_eq!(other_user.sequence, 1);
        assert_eq!(other_category.sequence, 1);
    }

    #[tokio::test]
    async fn test_gap_is_filled_first() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "photo_message_7_1.jpg");
        touch(dir.path(), "photo_message_7_3.jpg");
        let allocator = SlotAllocator::new(dir.path());

        let slot = allocator
            .next_slot(&UserId::from(7_i64), MediaCategory::Photo)
            .await
            .unwrap();

        assert_eq!(slot.sequence, 2);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let allocator = SlotAllocator::new(dir.path().join("missing"));

        let result = allocator
            .next_slot(&UserId::from(7_i64), MediaCategory::Photo)
            .await;

        assert!(matches!(result, Err(StorageError::RootUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unsafe_user_id_rejected() {
        let dir = tempdir().unwrap();
        let allocator = SlotAllocator::new(dir.path());

        let result = allocator
            .next_slot(&UserId::from("../../etc"), MediaCategory::Photo)
            .await;

        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
