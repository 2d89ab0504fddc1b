//! Mediagate Processing Library
//!
//! This crate provides the CPU-bound stages of the ingestion pipeline:
//! - Upload validation (size limits, declared MIME type)
//! - The face-presence gate backed by an MTCNN cascade
//! - Audio normalization to 16-bit PCM WAV at a fixed sample rate
//!
//! Everything here is synchronous; async callers run it on the blocking pool.

pub mod audio;
pub mod error;
pub mod face;
pub mod validator;

pub use audio::AudioNormalizer;
pub use error::{ProcessingError, ProcessingResult};
pub use face::{CascadeNets, DetectionOutcome, FaceBox, FaceDetector, FaceGate, Mtcnn, OnnxNets};
pub use validator::{MediaValidator, ValidationError};
