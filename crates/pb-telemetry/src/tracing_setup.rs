use uuid::Uuid;

/// Generate a trace ID (32 hex characters).
pub fn generate_trace_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// Generate a span ID (16 hex characters).
pub fn generate_span_id() -> String {
    Uuid::new_v4().as_simple().to_string()[..16].to_string()
}

/// Span covering one fetch of one feed. Returns the span and its trace ID so
/// log lines outside the span can still be correlated.
pub fn create_refresh_span(feed: &str, seq: u64) -> (tracing::Span, String) {
    let trace_id = generate_trace_id();
    let span_id = generate_span_id();
    let span = tracing::info_span!(
        "refresh",
        trace_id = %trace_id,
        span_id = %span_id,
        feed = %feed,
        seq = seq,
    );
    (span, trace_id)
}
