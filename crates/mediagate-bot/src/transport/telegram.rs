//! Telegram Bot API transport over long polling.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mediagate_core::{GatewayConfig, IngestError, UserId};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::{Content, DownloadedFile, InboundEvent, Transport};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    document: Option<Document>,
    audio: Option<FileRef>,
    voice: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

/// Map one update to an event. Updates without a message or a sender are skipped.
fn to_event(update: Update) -> Option<InboundEvent> {
    let message = update.message?;
    let user_id = UserId::from(message.from?.id);
    let chat_id = message.chat.id;

    let content = if let Some(sizes) = message.photo {
        match sizes
            .into_iter()
            .max_by_key(|s| u64::from(s.width) * u64::from(s.height))
        {
            Some(largest) => Content::Photo {
                file_id: largest.file_id,
            },
            None => Content::Other,
        }
    } else if let Some(doc) = message.document {
        Content::Document {
            file_id: doc.file_id,
            mime_type: doc.mime_type,
        }
    } else if let Some(audio) = message.audio {
        Content::Audio {
            file_id: audio.file_id,
        }
    } else if let Some(voice) = message.voice {
        Content::Voice {
            file_id: voice.file_id,
        }
    } else if let Some(command) = message
        .text
        .as_deref()
        .filter(|t| t.starts_with('/'))
        .and_then(|t| t.split_whitespace().next())
    {
        // "/start@my_bot" addresses this bot in group chats
        let name = command.split('@').next().unwrap_or(command);
        Content::Command(name.to_string())
    } else {
        Content::Other
    };

    Some(InboundEvent {
        user_id,
        chat_id,
        content,
    })
}

/// Telegram client
pub struct TelegramTransport {
    client: Client,
    base_url: String,
    token: String,
    poll_timeout_secs: u64,
    offset: AtomicI64,
}

impl TelegramTransport {
    pub fn new(
        base_url: &str,
        token: String,
        poll_timeout_secs: u64,
        http_timeout_secs: u64,
    ) -> Result<Self, IngestError> {
        // The long poll itself must fit inside the request timeout
        let timeout = Duration::from_secs(http_timeout_secs.max(poll_timeout_secs + 10));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            poll_timeout_secs,
            offset: AtomicI64::new(0),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, IngestError> {
        Self::new(
            &config.telegram_api_url,
            config.telegram_bot_token.clone(),
            config.poll_timeout_secs,
            config.http_timeout_secs,
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, IngestError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                IngestError::Transport(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            IngestError::Transport(format!(
                "{} response unreadable: {}",
                method,
                e.without_url()
            ))
        })?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(IngestError::Transport(format!(
                "{} rejected: {}",
                method,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn receive(&self) -> Result<Vec<InboundEvent>, IngestError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                serde_json::json!({
                    "offset": self.offset.load(Ordering::SeqCst),
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }

        Ok(updates.into_iter().filter_map(to_event).collect())
    }

    async fn download(
        &self,
        file_id: &str,
        temp_dir: &Path,
    ) -> Result<DownloadedFile, IngestError> {
        let file: File = self
            .call("getFile", serde_json::json!({ "file_id": file_id }))
            .await?;
        let file_path = file.file_path.ok_or_else(|| {
            IngestError::Transport(format!("No download path for file {}", file_id))
        })?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::Transport(format!("Download failed: {}", e.without_url())))?;

        let temp = NamedTempFile::new_in(temp_dir).map_err(|e| {
            IngestError::Storage(format!(
                "Failed to create temporary file in {}: {}",
                temp_dir.display(),
                e
            ))
        })?;
        let std_file = temp
            .reopen()
            .map_err(|e| IngestError::Storage(format!("Failed to open temporary file: {}", e)))?;
        let mut writer = tokio::fs::File::from_std(std_file);

        let mut size = 0usize;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                IngestError::Transport(format!("Download interrupted: {}", e.without_url()))
            })?;
            size += chunk.len();
            writer.write_all(&chunk).await.map_err(|e| {
                IngestError::Storage(format!("Failed to write temporary file: {}", e))
            })?;
        }
        writer
            .flush()
            .await
            .map_err(|e| IngestError::Storage(format!("Failed to write temporary file: {}", e)))?;

        tracing::debug!(
            file_id = %file_id,
            path = %temp.path().display(),
            size_bytes = size,
            "File downloaded"
        );

        Ok(DownloadedFile::new(temp))
    }

    async fn send_reply(&self, chat_id: i64, text: &str) -> Result<(), IngestError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }
}
