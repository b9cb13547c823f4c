use crate::server::HttpState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use promsink_metrics::MetricSink;
use std::sync::Arc;

/// Count each scrape through the sink it serves.
pub async fn count_scrapes(
    State(state): State<Arc<HttpState>>,
    request: Request,
    next: Next,
) -> Response {
    state.sink.incr_counter(&["promsink", "scrapes", "total"], 1.0);
    next.run(request).await
}
