use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use image::{ImageReader, RgbImage};

use super::{FaceBox, FaceDetector};
use crate::error::{ProcessingError, ProcessingResult};

/// Result of running the gate over one image.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub accepted: bool,
    pub faces: Vec<FaceBox>,
}

/// Accepts images that contain at least one face.
///
/// Cheap to clone; every clone shares the detector built at startup.
#[derive(Clone)]
pub struct FaceGate {
    detector: Arc<dyn FaceDetector>,
}

impl FaceGate {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn device(&self) -> &str {
        self.detector.device()
    }

    /// Decode image bytes of any supported format into RGB.
    pub fn decode(image_bytes: &[u8]) -> ProcessingResult<RgbImage> {
        let reader = ImageReader::new(Cursor::new(image_bytes))
            .with_guessed_format()
            .map_err(|e| ProcessingError::Decode(format!("Failed to read image: {}", e)))?;

        let image = reader
            .decode()
            .map_err(|e| ProcessingError::Decode(format!("Failed to decode image: {}", e)))?;

        Ok(image.to_rgb8())
    }

    /// Decode and run detection, keeping the boxes.
    pub fn inspect(&self, image_bytes: &[u8]) -> ProcessingResult<DetectionOutcome> {
        let image = Self::decode(image_bytes)?;
        let start = Instant::now();
        let faces = self.detector.detect(&image)?;

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            faces = faces.len(),
            best_score = faces.iter().map(|f| f.score).fold(0.0_f32, f32::max),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Face detection finished"
        );

        Ok(DetectionOutcome {
            accepted: !faces.is_empty(),
            faces,
        })
    }

    /// Whether the image contains at least one face.
    ///
    /// Undecodable bytes are a [`ProcessingError::Decode`], never `false`.
    pub fn has_face(&self, image_bytes: &[u8]) -> ProcessingResult<bool> {
        Ok(self.inspect(image_bytes)?.accepted)
    }
}
