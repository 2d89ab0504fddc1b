use std::sync::Arc;
use std::time::Instant;

use mediagate_core::models::IngestState;
use mediagate_core::{
    ErrorMetadata, GatewayConfig, IngestError, IngestOutcome, LogLevel, MediaCategory, MediaRequest,
};
use mediagate_processing::{AudioNormalizer, FaceDetector, FaceGate, MediaValidator};
use mediagate_storage::MediaStore;

/// Routes each request through the face gate or the audio normalizer and persists
/// what is accepted.
///
/// Requests are independent; a failure is reported in the returned outcome and
/// never affects other requests.
#[derive(Clone)]
pub struct IngestionService {
    face_gate: FaceGate,
    normalizer: AudioNormalizer,
    store: Arc<dyn MediaStore>,
    photo_validator: MediaValidator,
    audio_validator: MediaValidator,
}

impl IngestionService {
    pub fn new(
        face_gate: FaceGate,
        normalizer: AudioNormalizer,
        store: Arc<dyn MediaStore>,
        photo_validator: MediaValidator,
        audio_validator: MediaValidator,
    ) -> Self {
        Self {
            face_gate,
            normalizer,
            store,
            photo_validator,
            audio_validator,
        }
    }

    /// Build the service with limits and sample rate taken from the configuration.
    pub fn from_config(
        config: &GatewayConfig,
        detector: Arc<dyn FaceDetector>,
        store: Arc<dyn MediaStore>,
    ) -> Self {
        Self::new(
            FaceGate::new(detector),
            AudioNormalizer::new(config.target_sample_rate),
            store,
            MediaValidator::for_images(config.max_photo_size_bytes),
            MediaValidator::for_audio(config.max_audio_size_bytes),
        )
    }

    /// Check a document's declared MIME type before its content is fetched.
    ///
    /// A document without a MIME type is not treated as an image.
    pub fn accepts_document(&self, mime_type: Option<&str>) -> Result<(), IngestError> {
        let mime_type =
            mime_type.ok_or_else(|| IngestError::UnsupportedMimeType("unknown".to_string()))?;
        self.photo_validator
            .validate_content_type(mime_type)
            .map_err(|e| IngestError::from(mediagate_processing::ProcessingError::from(e)))
    }

    /// Run one request to completion.
    #[tracing::instrument(
        skip(self, request),
        fields(
            user_id = %request.user_id,
            category = %request.category,
            size_bytes = request.size(),
        )
    )]
    pub async fn ingest(&self, request: MediaRequest) -> IngestOutcome {
        let start = Instant::now();
        tracing::debug!(
            state = ?IngestState::Received,
            mime_type = ?request.mime_type,
            "Request received"
        );

        let outcome = match self.process(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                log_failure(&err);
                IngestOutcome::Failed(err)
            }
        };

        match &outcome {
            IngestOutcome::Stored { path, sequence, .. } => tracing::info!(
                state = ?outcome.final_state(),
                path = %path.display(),
                sequence = *sequence,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Media stored"
            ),
            _ => tracing::debug!(
                state = ?outcome.final_state(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Request finished"
            ),
        }

        outcome
    }

    async fn process(&self, request: MediaRequest) -> Result<IngestOutcome, IngestError> {
        let MediaRequest {
            user_id,
            category,
            payload,
            mime_type,
            container_hint,
        } = request;

        let validator = match category {
            MediaCategory::Photo => &self.photo_validator,
            MediaCategory::Audio => &self.audio_validator,
        };
        validator
            .validate(payload.len(), mime_type.as_deref())
            .map_err(|e| IngestError::from(mediagate_processing::ProcessingError::from(e)))?;

        let data = match category {
            MediaCategory::Photo => {
                let gate = self.face_gate.clone();
                let (payload, detection) = tokio::task::spawn_blocking(move || {
                    let detection = gate.inspect(&payload);
                    (payload, detection)
                })
                .await
                .map_err(|e| IngestError::Internal(format!("Face detection task failed: {}", e)))?;
                let detection = detection?;

                tracing::debug!(
                    state = ?IngestState::Validated,
                    faces = detection.faces.len(),
                    "Image decoded"
                );
                if !detection.accepted {
                    tracing::info!(state = ?IngestState::Rejected, "No face found, photo rejected");
                    return Ok(IngestOutcome::Rejected);
                }
                tracing::debug!(
                    state = ?IngestState::Accepted,
                    best_score = detection.faces.first().map(|f| f.score),
                    "Face found"
                );

                // Photos are stored exactly as received
                payload
            }
            MediaCategory::Audio => {
                let normalizer = self.normalizer;
                let wav = tokio::task::spawn_blocking(move || {
                    normalizer.normalize(payload, container_hint.as_deref())
                })
                .await
                .map_err(|e| {
                    IngestError::Internal(format!("Audio normalization task failed: {}", e))
                })??;

                tracing::debug!(
                    state = ?IngestState::Accepted,
                    wav_size_bytes = wav.len(),
                    "Audio normalized"
                );
                wav
            }
        };

        let slot = self.store.store(&user_id, category, data).await?;

        Ok(IngestOutcome::Stored {
            category,
            path: slot.path(),
            sequence: slot.sequence,
        })
    }
}

fn log_failure(err: &IngestError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            state = ?IngestState::Failed,
            error_code = err.error_code(),
            error = %err,
            "Request failed"
        ),
        LogLevel::Warn => tracing::warn!(
            state = ?IngestState::Failed,
            error_code = err.error_code(),
            error = %err,
            "Request failed"
        ),
        LogLevel::Error => tracing::error!(
            state = ?IngestState::Failed,
            error_code = err.error_code(),
            error = %err,
            "Request failed"
        ),
    }
}
