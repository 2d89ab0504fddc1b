//! Mediagate Core Library
//!
//! This crate provides the domain models, error types, configuration and constants
//! shared by every Mediagate component: the slot allocator, the processing stages,
//! the ingestion orchestrator and the messaging transport.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ComputeDevice, GatewayConfig, MtcnnConfig};
pub use error::{ErrorMetadata, IngestError, LogLevel};
pub use models::{IngestOutcome, MediaCategory, MediaRequest, UserId};
