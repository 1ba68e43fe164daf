//! Observability for the pulseboard refresh pipeline.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`,
//!   always on stderr so command output on stdout stays clean
//! - **Metrics**: per-feed fetch outcome counters, record gauges and a
//!   duration histogram with Prometheus text export
//! - **Tracing**: trace/span id generation and one span per refresh cycle

pub mod logging;
pub mod metrics;
pub mod tracing_setup;
