pub mod fixtures;

use async_trait::async_trait;
use image::RgbImage;
use mediagate_core::{MediaCategory, UserId};
use mediagate_processing::{FaceBox, FaceDetector, ProcessingResult};
use mediagate_services::{
    AudioNormalizer, FaceGate, IngestionService, LocalMediaStore, MediaStore, MediaValidator,
    StorageError, StorageResult, StorageSlot,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Detector that reports one face or none, whatever the image shows.
pub struct StubDetector {
    face: bool,
}

impl StubDetector {
    pub fn with_face() -> Arc<dyn FaceDetector> {
        Arc::new(Self { face: true })
    }

    pub fn without_face() -> Arc<dyn FaceDetector> {
        Arc::new(Self { face: false })
    }
}

impl FaceDetector for StubDetector {
    fn detect(&self, image: &RgbImage) -> ProcessingResult<Vec<FaceBox>> {
        if !self.face {
            return Ok(Vec::new());
        }
        Ok(vec![FaceBox {
            x1: 0.0,
            y1: 0.0,
            x2: image.width() as f32,
            y2: image.height() as f32,
            score: 0.99,
            landmarks: None,
        }])
    }
}

/// Store whose disk is always full.
pub struct FailingStore;

#[async_trait]
impl MediaStore for FailingStore {
    async fn next_slot(
        &self,
        _user_id: &UserId,
        _category: MediaCategory,
    ) -> StorageResult<StorageSlot> {
        Err(StorageError::WriteFailed(
            "No space left on device".to_string(),
        ))
    }

    async fn store(
        &self,
        _user_id: &UserId,
        _category: MediaCategory,
        _data: Vec<u8>,
    ) -> StorageResult<StorageSlot> {
        Err(StorageError::WriteFailed(
            "No space left on device".to_string(),
        ))
    }
}

/// An ingestion service writing into a fresh temporary directory.
pub struct TestGateway {
    pub service: IngestionService,
    pub photo_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestGateway {
    /// Every file name currently under `dir`, sorted.
    pub fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn photos(&self) -> Vec<String> {
        Self::files_in(&self.photo_dir)
    }

    pub fn audio(&self) -> Vec<String> {
        Self::files_in(&self.audio_dir)
    }
}

fn build_service(detector: Arc<dyn FaceDetector>, store: Arc<dyn MediaStore>) -> IngestionService {
    IngestionService::new(
        FaceGate::new(detector),
        AudioNormalizer::default(),
        store,
        MediaValidator::for_images(MAX_UPLOAD_BYTES),
        MediaValidator::for_audio(MAX_UPLOAD_BYTES),
    )
}

/// Setup a gateway backed by local storage in a temporary directory
pub async fn setup_gateway(detector: Arc<dyn FaceDetector>) -> TestGateway {
    let temp_dir = tempfile::tempdir().unwrap();
    let photo_dir = temp_dir.path().join("photos");
    let audio_dir = temp_dir.path().join("audio");

    let store = LocalMediaStore::new(&photo_dir, &audio_dir).await.unwrap();

    TestGateway {
        service: build_service(detector, Arc::new(store)),
        photo_dir,
        audio_dir,
        _temp_dir: temp_dir,
    }
}

/// Setup a gateway whose every write fails
pub fn setup_failing_gateway(detector: Arc<dyn FaceDetector>) -> IngestionService {
    build_service(detector, Arc::new(FailingStore))
}
