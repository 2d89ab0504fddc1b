//! Telemetry initialization
//!
//! One global tracing subscriber per process, filtered by `RUST_LOG` and printed as
//! human-readable text or one JSON object per line.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat, DEFAULT_FILTER};
