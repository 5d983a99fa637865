//! Span utilities and extension traits for decode tracing.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for beam decode spans.
pub struct DecodeSpan;

impl DecodeSpan {
    /// Create a span for one decode call.
    ///
    /// `status`, `error.message`, `steps` and `latency_ms` are filled in
    /// after completion.
    pub fn new(request_id: &str, batch_size: usize, beam_size: usize) -> Span {
        info_span!(
            "beam_decode",
            request_id = %request_id,
            batch_size,
            beam_size,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            steps = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
