//! Face presence detection
//!
//! [`FaceGate`] is what the pipeline talks to: it decodes image bytes and asks an
//! injected [`FaceDetector`] for faces. The production detector is [`Mtcnn`] running
//! on [`OnnxNets`]; tests substitute their own detector.

mod cascade;
mod gate;
pub mod geometry;
mod onnx;

pub use cascade::{CascadeNets, Mtcnn, ProposalMaps, StageScores};
pub use gate::{DetectionOutcome, FaceGate};
pub use onnx::OnnxNets;

use image::RgbImage;

use crate::error::ProcessingResult;

/// One detected face in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Output-stage face probability.
    pub score: f32,
    /// Eyes, nose and mouth corners as (x, y) pairs.
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// Finds faces in a decoded RGB image.
///
/// Implementations are built once at startup and shared across requests, so they
/// must be deterministic for a given image and safe to call from any thread.
pub trait FaceDetector: Send + Sync {
    /// All faces found, largest first. Empty when there are none.
    fn detect(&self, image: &RgbImage) -> ProcessingResult<Vec<FaceBox>>;

    /// Short name of where inference runs, e.g. `cpu` or `cuda:0`.
    fn device(&self) -> &str {
        "cpu"
    }
}
