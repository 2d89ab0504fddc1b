use crate::slot::{SlotAllocator, StorageSlot};
use crate::traits::{MediaStore, StorageError, StorageResult};
use async_trait::async_trait;
use mediagate_core::{MediaCategory, UserId};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::fs;

type SlotKey = (PathBuf, UserId, MediaCategory);

/// Local filesystem media store
///
/// Photos and audio live under separate root directories. Allocation and write are
/// serialized per (root, user, category), and the final file is created with a
/// no-clobber rename so a slot taken by a foreign writer is never overwritten.
pub struct LocalMediaStore {
    photos: SlotAllocator,
    audio: SlotAllocator,
    locks: Mutex<HashMap<SlotKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalMediaStore {
    /// Create a new LocalMediaStore, creating both root directories if needed
    ///
    /// # Arguments
    /// * `photo_dir` - Root directory for photos (e.g., "data/photos")
    /// * `audio_dir` - Root directory for normalized audio (e.g., "data/audio")
    pub async fn new(
        photo_dir: impl Into<PathBuf>,
        audio_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let photo_dir = photo_dir.into();
        let audio_dir = audio_dir.into();

        for dir in [&photo_dir, &audio_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::RootUnavailable(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self::with_existing_roots(photo_dir, audio_dir))
    }

    /// Use the given roots as they are. Missing roots surface as errors on first use.
    pub fn with_existing_roots(
        photo_dir: impl Into<PathBuf>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        LocalMediaStore {
            photos: SlotAllocator::new(photo_dir),
            audio: SlotAllocator::new(audio_dir),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self, category: MediaCategory) -> &Path {
        self.allocator(category).root()
    }

    fn allocator(&self, category: MediaCategory) -> &SlotAllocator {
        match category {
            MediaCategory::Photo => &self.photos,
            MediaCategory::Audio => &self.audio,
        }
    }

    fn slot_key(&self, user_id: &UserId, category: MediaCategory) -> SlotKey {
        (self.root(category).to_path_buf(), user_id.clone(), category)
    }

    fn lock_for(&self, key: &SlotKey) -> Arc<tokio::sync::Mutex<()>> {
        // The map only holds Arcs; a panic while it was held leaves nothing half-updated.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the map entry once no other writer holds or waits on `lock`.
    fn release_lock(&self, key: &SlotKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    async fn store_locked(
        &self,
        user_id: &UserId,
        category: MediaCategory,
        data: Vec<u8>,
    ) -> StorageResult<StorageSlot> {
        let slot = self
            .allocator(category)
            .next_slot(user_id, category)
            .await?;
        let size = data.len();
        let start = std::time::Instant::now();

        let slot = tokio::task::spawn_blocking(move || write_no_clobber(slot, &data))
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Write task failed: {}", e)))??;

        tracing::info!(
            path = %slot.path().display(),
            user_id = %user_id,
            category = %category,
            sequence = slot.sequence,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(slot)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Write `data` next to `slot` and move it into place without replacing an existing
/// file, advancing to the next number whenever the slot has been taken meanwhile.
fn write_no_clobber(mut slot: StorageSlot, data: &[u8]) -> StorageResult<StorageSlot> {
    let mut tmp = NamedTempFile::new_in(&slot.root).map_err(|e| {
        StorageError::WriteFailed(format!(
            "Failed to create temporary file in {}: {}",
            slot.root.display(),
            e
        ))
    })?;

    tmp.write_all(data)
        .map_err(|e| StorageError::WriteFailed(format!("Failed to write temporary file: {}", e)))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::WriteFailed(format!("Failed to sync temporary file: {}", e)))?;

    loop {
        match tmp.persist_noclobber(slot.path()) {
            Ok(_) => return Ok(slot),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(
                    path = %slot.path().display(),
                    "Slot taken by another writer, trying the next one"
                );
                tmp = e.file;
                slot = slot.next();
            }
            Err(e) => {
                return Err(StorageError::WriteFailed(format!(
                    "Failed to persist {}: {}",
                    slot.path().display(),
                    e.error
                )))
            }
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn next_slot(
        &self,
        user_id: &UserId,
        category: MediaCategory,
    ) -> StorageResult<StorageSlot> {
        self.allocator(category).next_slot(user_id, category).await
    }

    async fn store(
        &self,
        user_id: &UserId,
        category: MediaCategory,
        data: Vec<u8>,
    ) -> StorageResult<StorageSlot> {
        let key = self.slot_key(user_id, category);
        let lock = self.lock_for(&key);

        let result = {
            let _guard = lock.lock().await;
            self.store_locked(user_id, category, data).await
        };

        self.release_lock(&key, lock);
        result
    }
}
