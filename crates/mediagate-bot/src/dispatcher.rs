//! Update dispatcher
//!
//! Pulls events from the transport one batch at a time and runs each event to
//! completion before taking the next one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mediagate_core::constants::{START_MESSAGE, VOICE_CONTAINER_HINT};
use mediagate_core::{ErrorMetadata, IngestError, MediaRequest, UserId};
use mediagate_services::IngestionService;

use crate::transport::{Content, InboundEvent, Transport};

/// Delay before polling again after a failed receive.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    service: IngestionService,
    temp_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        service: IngestionService,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            service,
            temp_dir: temp_dir.into(),
        }
    }

    /// Poll forever.
    pub async fn run(&self) {
        tracing::info!("Polling for updates");
        loop {
            match self.transport.receive().await {
                Ok(events) => {
                    for event in events {
                        self.handle(event).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to receive updates");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Handle one event and answer the chat it came from.
    #[tracing::instrument(
        skip(self, event),
        fields(user_id = %event.user_id, chat_id = event.chat_id)
    )]
    pub async fn handle(&self, event: InboundEvent) {
        let InboundEvent {
            user_id,
            chat_id,
            content,
        } = event;

        let reply = match content {
            Content::Command(command) if command == "/start" => Some(START_MESSAGE),
            Content::Command(command) => {
                tracing::debug!(command = %command, "Ignoring unknown command");
                None
            }
            Content::Other => None,
            Content::Document { file_id, mime_type } => {
                match self.service.accepts_document(mime_type.as_deref()) {
                    Ok(()) => Some(
                        self.ingest_file(&file_id, |payload| {
                            MediaRequest::document(
                                user_id.clone(),
                                payload,
                                mime_type.clone().unwrap_or_default(),
                            )
                        })
                        .await,
                    ),
                    Err(e) => {
                        tracing::debug!(mime_type = ?mime_type, error = %e, "Document refused");
                        Some(e.client_message())
                    }
                }
            }
            Content::Photo { file_id } => Some(
                self.ingest_file(&file_id, |payload| {
                    MediaRequest::photo(user_id.clone(), payload)
                })
                .await,
            ),
            Content::Audio { file_id } | Content::Voice { file_id } => Some(
                self.ingest_file(&file_id, |payload| audio_request(&user_id, payload))
                    .await,
            ),
        };

        if let Some(text) = reply {
            if let Err(e) = self.transport.send_reply(chat_id, text).await {
                tracing::error!(error = %e, "Failed to send reply");
            }
        }
    }

    /// Download a file, ingest it and return the reply text.
    ///
    /// The downloaded file lives until the request finishes, whatever the outcome.
    async fn ingest_file<F>(&self, file_id: &str, build: F) -> &'static str
    where
        F: FnOnce(Vec<u8>) -> MediaRequest,
    {
        let payload = match self.fetch(file_id).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Download failed");
                return e.client_message();
            }
        };

        self.service.ingest(build(payload)).await.reply_text()
    }

    async fn fetch(&self, file_id: &str) -> Result<Vec<u8>, IngestError> {
        let file = self.transport.download(file_id, &self.temp_dir).await?;
        let payload = file.read().await?;
        tracing::debug!(path = %file.path().display(), size_bytes = payload.len(), "Payload read");
        Ok(payload)
    }
}

fn audio_request(user_id: &UserId, payload: Vec<u8>) -> MediaRequest {
    MediaRequest::audio(user_id.clone(), payload, VOICE_CONTAINER_HINT)
}
