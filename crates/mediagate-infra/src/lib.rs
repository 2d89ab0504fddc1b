//! Mediagate Infrastructure Library
//!
//! This crate provides shared infrastructure used by the Mediagate binaries:
//! - Telemetry initialization (tracing subscriber, text or JSON output)

pub mod telemetry;

// Re-export commonly used types
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
