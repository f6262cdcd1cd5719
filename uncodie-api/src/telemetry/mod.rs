//! Uncodie Telemetry
//!
//! Structured logging for the API process. Request spans come from
//! `tower_http::trace::TraceLayer` in the router.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
