use crate::server::HttpState;
use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use std::sync::Arc;

pub async fn health_check(State(state): State<Arc<HttpState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics_path": state.metrics_path,
        "self_instrument": state.self_instrument,
    }))
}
