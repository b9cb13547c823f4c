use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, Registry, TextEncoder};

/// Render prometheus text exposition format from a registry.
pub fn render_metrics(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    encode(registry, &mut buffer);
    String::from_utf8(buffer).unwrap_or_default()
}

/// Gather and encode into `buffer`, returning the content type.
fn encode(registry: &Registry, buffer: &mut Vec<u8>) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    if let Err(e) = encoder.encode(&metric_families, buffer) {
        tracing::error!(error = %e, "Failed to encode prometheus metrics");
    }
    encoder.format_type().to_string()
}

/// Scrape response for `registry` with the exposition content type.
pub(crate) fn scrape_response(registry: &Registry) -> Response {
    let mut buffer = Vec::with_capacity(16 * 1024);
    let content_type = encode(registry, &mut buffer);
    ([(CONTENT_TYPE, content_type)], buffer).into_response()
}
