use std::time::Instant;

use mediagate_core::constants::TARGET_SAMPLE_RATE;

use super::decoder::SimpleDecoder;
use super::encoder::encode_wav;
use super::resampler::Resampler;
use crate::error::{ProcessingError, ProcessingResult};

/// Re-encodes arbitrary audio to 16-bit PCM WAV at a fixed sample rate.
#[derive(Debug, Clone, Copy)]
pub struct AudioNormalizer {
    target_sample_rate: u32,
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self::new(TARGET_SAMPLE_RATE)
    }
}

impl AudioNormalizer {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode `audio_bytes`, resample and return a complete WAV file.
    ///
    /// Nothing is returned unless every step succeeded, so callers never persist a
    /// partial file.
    pub fn normalize(
        &self,
        audio_bytes: Vec<u8>,
        container_hint: Option<&str>,
    ) -> ProcessingResult<Vec<u8>> {
        let start = Instant::now();
        let input_size = audio_bytes.len();

        let decoded = SimpleDecoder::decode(audio_bytes, container_hint)?;
        let samples = Resampler::resample(
            &decoded.samples,
            decoded.sample_rate,
            self.target_sample_rate,
            decoded.channels,
        )?;
        if samples.is_empty() {
            return Err(ProcessingError::Decode(format!(
                "Clip too short to resample: {} frames at {} Hz",
                decoded.frames(),
                decoded.sample_rate
            )));
        }
        let wav = encode_wav(&samples, self.target_sample_rate, decoded.channels)?;

        tracing::debug!(
            input_size_bytes = input_size,
            output_size_bytes = wav.len(),
            source_sample_rate = decoded.sample_rate,
            target_sample_rate = self.target_sample_rate,
            channels = decoded.channels,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Audio normalized"
        );

        Ok(wav)
    }
}
