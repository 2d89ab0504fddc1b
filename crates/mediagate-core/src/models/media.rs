use serde::{Deserialize, Serialize};
use std::fmt;

/// Media category of an ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Photo,
    Audio,
}

impl MediaCategory {
    /// Prefix used in stored filenames (`photo_message_...`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "photo",
            MediaCategory::Audio => "audio",
        }
    }

    /// File extension of stored items, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaCategory::Photo => ".jpg",
            MediaCategory::Audio => ".wav",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a sender, rendered verbatim into stored filenames.
///
/// The transport decides what the identifier is (Telegram uses the numeric user id);
/// path-safety is checked by the storage layer when a slot is computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
