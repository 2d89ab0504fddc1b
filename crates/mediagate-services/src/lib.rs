//! Mediagate Services Layer
//!
//! This crate is the **business service layer**: it hosts the ingestion
//! orchestrator and re-exports the processing and storage types it is built from,
//! so the bot depends on a single service facade. Keep pipeline logic here and
//! keep transport handling in mediagate-bot.

pub mod ingestion;

pub use ingestion::IngestionService;
pub use mediagate_processing::{
    AudioNormalizer, DetectionOutcome, FaceBox, FaceDetector, FaceGate, MediaValidator, Mtcnn,
    OnnxNets,
};
pub use mediagate_storage::{
    LocalMediaStore, MediaStore, SlotAllocator, StorageError, StorageResult, StorageSlot,
};
