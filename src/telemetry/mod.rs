//! Telemetry for the decoding runtime.
//!
//! Structured logging through `tracing`, per-decode spans, and counters and
//! histograms through the `metrics` facade. The library installs no metrics
//! exporter; embedding applications choose one.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    describe_metrics, record_decode, record_numeric_anomalies, record_shard, record_skipped_items,
};
pub use spans::{DecodeSpan, SpanExt};
