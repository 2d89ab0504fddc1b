//! Audio normalization
//!
//! Any supported container/codec in, 16-bit PCM WAV at the target sample rate out.
//! The channel count is preserved.

mod decoder;
mod encoder;
mod normalizer;
mod resampler;

pub use decoder::{DecodedAudio, SimpleDecoder};
pub use encoder::encode_wav;
pub use normalizer::AudioNormalizer;
pub use resampler::Resampler;
