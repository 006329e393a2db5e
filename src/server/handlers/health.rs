use crate::server::state::AppState;
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Liveness probe with a few facts about the running instance
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "allowed_hosts": state.allow_list.len(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus text exposition of the proxy metrics
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
