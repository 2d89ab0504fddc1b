//! Mediagate Storage Library
//!
//! This crate persists accepted media into per-user, collision-free file slots.
//!
//! # Slot naming
//!
//! Every stored item lives directly under the root directory of its category:
//!
//! - **Photos**: `{photo_dir}/photo_message_{user_id}_{n}.jpg`
//! - **Audio**: `{audio_dir}/audio_message_{user_id}_{n}.wav`
//!
//! `n` starts at 1 and is the smallest number whose file does not exist yet. There is
//! no manifest: the directory listing is the source of truth. Name generation is
//! centralized in the `keys` module.

pub(crate) mod keys;
pub mod local;
pub mod slot;
pub mod traits;

// Re-export commonly used types
pub use local::LocalMediaStore;
pub use slot::{SlotAllocator, StorageSlot};
pub use traits::{MediaStore, StorageError, StorageResult};
