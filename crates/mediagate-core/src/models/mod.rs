//! Data models for the ingestion pipeline
//!
//! Requests flow in from the transport as [`MediaRequest`]s and leave the
//! pipeline as [`IngestOutcome`]s.

mod media;
mod outcome;
mod request;

pub use media::{MediaCategory, UserId};
pub use outcome::{IngestOutcome, IngestState};
pub use request::MediaRequest;
