//! Application setup and initialization
//!
//! Everything that can fail at startup happens here, before the first update is
//! polled: telemetry, directories, detection models.

use anyhow::{Context, Result};
use mediagate_core::GatewayConfig;
use mediagate_infra::LogFormat;
use mediagate_services::{FaceDetector, IngestionService, LocalMediaStore, Mtcnn, OnnxNets};
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::transport::TelegramTransport;

/// Initialize the entire bot
pub async fn initialize_bot(config: GatewayConfig) -> Result<Dispatcher> {
    mediagate_infra::init_telemetry(
        env!("CARGO_PKG_NAME"),
        &config.environment,
        LogFormat::parse(&config.log_format),
    )
    .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment,
        photo_dir = %config.photo_dir.display(),
        audio_dir = %config.audio_dir.display(),
        temp_dir = %config.temp_dir.display(),
        "Configuration loaded and validated successfully"
    );

    let store = LocalMediaStore::new(&config.photo_dir, &config.audio_dir)
        .await
        .context("Failed to prepare storage directories")?;
    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create temporary directory {}",
                config.temp_dir.display()
            )
        })?;

    let detector = load_detector(&config).await?;
    tracing::info!("Running on device: {}", detector.device());

    let service = IngestionService::from_config(&config, detector, Arc::new(store));
    let transport =
        TelegramTransport::from_config(&config).context("Failed to create Telegram client")?;

    Ok(Dispatcher::new(
        Arc::new(transport),
        service,
        config.temp_dir.clone(),
    ))
}

/// Load the three MTCNN networks once. A missing or broken model is fatal.
async fn load_detector(config: &GatewayConfig) -> Result<Arc<dyn FaceDetector>> {
    let mtcnn = config.mtcnn.clone();
    let model_dir = mtcnn.model_dir.clone();

    let start = std::time::Instant::now();
    let nets = tokio::task::spawn_blocking(move || OnnxNets::load(&mtcnn.model_dir, mtcnn.device))
        .await
        .context("Model loading task panicked")?
        .with_context(|| format!("Failed to load MTCNN models from {}", model_dir.display()))?;

    tracing::info!(
        model_dir = %model_dir.display(),
        duration_ms = start.elapsed().as_millis() as u64,
        "MTCNN models loaded"
    );

    Ok(Arc::new(Mtcnn::new(nets, config.mtcnn.clone())))
}
