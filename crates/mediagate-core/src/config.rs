//! Configuration module
//!
//! This module provides the gateway configuration: storage directories, the
//! messaging transport credential, detector hyperparameters and compute device.

use std::env;
use std::path::PathBuf;

use crate::constants::TARGET_SAMPLE_RATE;

// Common constants
const MAX_PHOTO_SIZE_MB: usize = 20;
const MAX_AUDIO_SIZE_MB: usize = 50;
const POLL_TIMEOUT_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Where face detection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// Use an accelerator when one is available, otherwise the CPU.
    Auto,
    Cpu,
    Cuda,
}

impl ComputeDevice {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(ComputeDevice::Auto),
            "cpu" => Some(ComputeDevice::Cpu),
            "cuda" | "gpu" | "cuda:0" => Some(ComputeDevice::Cuda),
            _ => None,
        }
    }
}

/// Hyperparameters of the MTCNN face detector.
#[derive(Debug, Clone, PartialEq)]
pub struct MtcnnConfig {
    /// Directory holding `pnet.onnx`, `rnet.onnx` and `onet.onnx`.
    pub model_dir: PathBuf,
    /// Side of the square face crop produced by extraction.
    pub image_size: u32,
    /// Margin in pixels added around a face before cropping.
    pub margin: u32,
    /// Smallest face side, in pixels, the pyramid is built to find.
    pub min_face_size: u32,
    /// Per-stage confidence thresholds (proposal, refine, output).
    pub thresholds: [f32; 3],
    /// Scale-pyramid factor between consecutive levels.
    pub factor: f32,
    /// Standardize extracted crops to roughly [-1, 1].
    pub post_process: bool,
    pub device: ComputeDevice,
}

impl Default for MtcnnConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/mtcnn"),
            image_size: 160,
            margin: 0,
            min_face_size: 20,
            thresholds: [0.6, 0.7, 0.7],
            factor: 0.709,
            post_process: true,
            device: ComputeDevice::Auto,
        }
    }
}

impl MtcnnConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.min_face_size == 0 {
            return Err(anyhow::anyhow!("MTCNN min_face_size must be positive"));
        }
        if !(self.factor > 0.0 && self.factor < 1.0) {
            return Err(anyhow::anyhow!(
                "MTCNN factor must be in (0, 1), got {}",
                self.factor
            ));
        }
        if let Some(t) = self.thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(anyhow::anyhow!(
                "MTCNN thresholds must be in [0, 1], got {}",
                t
            ));
        }
        if self.image_size == 0 || self.margin >= self.image_size {
            return Err(anyhow::anyhow!(
                "MTCNN image_size must be positive and larger than margin ({} <= {})",
                self.image_size,
                self.margin
            ));
        }
        Ok(())
    }
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub environment: String,
    pub log_format: String,
    // Transport
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub poll_timeout_secs: u64,
    pub http_timeout_secs: u64,
    // Storage
    pub photo_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub temp_dir: PathBuf,
    // Processing
    pub max_photo_size_bytes: usize,
    pub max_audio_size_bytes: usize,
    pub target_sample_rate: u32,
    pub mtcnn: MtcnnConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let device_str = env::var("COMPUTE_DEVICE").unwrap_or_else(|_| "auto".to_string());
        let device = ComputeDevice::parse(&device_str).ok_or_else(|| {
            anyhow::anyhow!(
                "COMPUTE_DEVICE must be one of auto, cpu, cuda (got '{}')",
                device_str
            )
        })?;

        let mtcnn = MtcnnConfig {
            model_dir: env::var("MTCNN_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/mtcnn")),
            device,
            ..MtcnnConfig::default()
        };

        let config = GatewayConfig {
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "text".to_string())
                .to_lowercase(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .or_else(|_| env::var("TOKEN"))
                .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN must be set"))?,
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            poll_timeout_secs: env::var("POLL_TIMEOUT_SECS")
                .unwrap_or_else(|_| POLL_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(POLL_TIMEOUT_SECS),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            photo_dir: env::var("PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/photos")),
            audio_dir: env::var("AUDIO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/audio")),
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/tmp")),
            max_photo_size_bytes: env::var("MAX_PHOTO_SIZE_MB")
                .unwrap_or_else(|_| MAX_PHOTO_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_PHOTO_SIZE_MB)
                * 1024
                * 1024,
            max_audio_size_bytes: env::var("MAX_AUDIO_SIZE_MB")
                .unwrap_or_else(|_| MAX_AUDIO_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_AUDIO_SIZE_MB)
                * 1024
                * 1024,
            target_sample_rate: env::var("TARGET_SAMPLE_RATE")
                .unwrap_or_else(|_| TARGET_SAMPLE_RATE.to_string())
                .parse()
                .unwrap_or(TARGET_SAMPLE_RATE),
            mtcnn,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("TELEGRAM_BOT_TOKEN must not be empty"));
        }

        if self.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("TARGET_SAMPLE_RATE must be positive"));
        }

        if self.max_photo_size_bytes == 0 || self.max_audio_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_PHOTO_SIZE_MB and MAX_AUDIO_SIZE_MB must be positive"
            ));
        }

        if self.photo_dir == self.temp_dir || self.audio_dir == self.temp_dir {
            return Err(anyhow::anyhow!(
                "TEMP_DIR must differ from PHOTO_DIR and AUDIO_DIR"
            ));
        }

        self.mtcnn.validate()
    }
}
