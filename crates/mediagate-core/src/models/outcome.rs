use std::path::PathBuf;

use super::media::MediaCategory;
use crate::constants::{REPLY_AUDIO_SAVED, REPLY_IMAGE_SAVED, REPLY_NO_FACE};
use crate::error::{ErrorMetadata, IngestError};

/// Per-request pipeline states.
///
/// `Received -> Validated -> (Accepted | Rejected) -> (Stored | Failed)`.
/// Non-image documents and decode failures go straight from `Received` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Received,
    Validated,
    Accepted,
    Rejected,
    Stored,
    Failed,
}

/// Result of running one request through the pipeline, reported back to the transport.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The item was written to `path` at slot `sequence`.
    Stored {
        category: MediaCategory,
        path: PathBuf,
        sequence: u32,
    },
    /// A photo decoded fine but contained no face. Nothing was written.
    Rejected,
    /// The request failed; nothing was written.
    Failed(IngestError),
}

impl IngestOutcome {
    pub fn final_state(&self) -> IngestState {
        match self {
            IngestOutcome::Stored { .. } => IngestState::Stored,
            IngestOutcome::Rejected => IngestState::Rejected,
            IngestOutcome::Failed(_) => IngestState::Failed,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, IngestOutcome::Stored { .. })
    }

    /// Text sent back to the user.
    pub fn reply_text(&self) -> &'static str {
        match self {
            IngestOutcome::Stored {
                category: MediaCategory::Photo,
                ..
            } => REPLY_IMAGE_SAVED,
            IngestOutcome::Stored {
                category: MediaCategory::Audio,
                ..
            } => REPLY_AUDIO_SAVED,
            IngestOutcome::Rejected => REPLY_NO_FACE,
            IngestOutcome::Failed(err) => err.client_message(),
        }
    }
}
