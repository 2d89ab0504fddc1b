//! Messaging transport
//!
//! The dispatcher only sees [`Transport`]: a source of [`InboundEvent`]s, a way to
//! fetch the file an event refers to and a way to answer a chat.

pub mod telegram;

pub use telegram::TelegramTransport;

use async_trait::async_trait;
use mediagate_core::{IngestError, UserId};
use std::path::Path;
use tempfile::NamedTempFile;

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// A bot command such as `/start`, without arguments.
    Command(String),
    /// A compressed photo; `file_id` is the largest available size.
    Photo {
        file_id: String,
    },
    /// A file sent as a document.
    Document {
        file_id: String,
        mime_type: Option<String>,
    },
    Audio {
        file_id: String,
    },
    Voice {
        file_id: String,
    },
    /// Anything the gateway does not handle.
    Other,
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: i64,
    pub content: Content,
}

/// A downloaded file in the temp directory, removed when dropped.
#[derive(Debug)]
pub struct DownloadedFile {
    file: NamedTempFile,
}

impl DownloadedFile {
    pub fn new(file: NamedTempFile) -> Self {
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> Result<Vec<u8>, IngestError> {
        tokio::fs::read(self.file.path())
            .await
            .map_err(|e| IngestError::Transport(format!("Failed to read downloaded file: {}", e)))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next batch of events. May return an empty batch.
    async fn receive(&self) -> Result<Vec<InboundEvent>, IngestError>;

    /// Fetch the file behind `file_id` into a fresh file under `temp_dir`.
    async fn download(&self, file_id: &str, temp_dir: &Path)
        -> Result<DownloadedFile, IngestError>;

    async fn send_reply(&self, chat_id: i64, text: &str) -> Result<(), IngestError>;
}
