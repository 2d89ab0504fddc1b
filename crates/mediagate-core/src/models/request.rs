use super::media::{MediaCategory, UserId};

/// One inbound submission, created per transport event and consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub user_id: UserId,
    pub category: MediaCategory,
    pub payload: Vec<u8>,
    /// MIME type declared by the sender, present for document uploads.
    pub mime_type: Option<String>,
    /// Declared container of audio payloads (e.g. "ogg").
    pub container_hint: Option<String>,
}

impl MediaRequest {
    /// A photo sent as a compressed image.
    pub fn photo(user_id: impl Into<UserId>, payload: Vec<u8>) -> Self {
        Self {
            user_id: user_id.into(),
            category: MediaCategory::Photo,
            payload,
            mime_type: None,
            container_hint: None,
        }
    }

    /// A file sent as a document. It enters the photo path and is rejected
    /// before validation unless `mime_type` is an image type.
    pub fn document(
        user_id: impl Into<UserId>,
        payload: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category: MediaCategory::Photo,
            payload,
            mime_type: Some(mime_type.into()),
            container_hint: None,
        }
    }

    /// An audio file or voice note.
    pub fn audio(
        user_id: impl Into<UserId>,
        payload: Vec<u8>,
        container_hint: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category: MediaCategory::Audio,
            payload,
            mime_type: None,
            container_hint: Some(container_hint.into()),
        }
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
