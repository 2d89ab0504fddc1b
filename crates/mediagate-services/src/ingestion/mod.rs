//! Ingestion orchestration: validate → gate or normalize → allocate → store.

mod service;

pub use service::IngestionService;
