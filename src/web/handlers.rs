//! HTTP request handlers

use super::state::AppState;
use crate::search::SearchQuery;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, warn};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Search handler
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> Response {
    let query = match payload {
        Ok(Json(query)) => query,
        Err(rejection) => {
            debug!("Rejected search body: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    if let Err(e) = query.validate() {
        warn!("Rejected search: {}", e);
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
    }

    Json(state.aggregator.run_search(&query).await).into_response()
}

/// Registered backend ids, in registration order
pub async fn libraries(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "libraries": state.registry.names() }))
}

/// Per-backend statistics
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "instance_name": state.instance_name(),
        "backend_count": state.registry.len(),
        "metrics": state.metrics.snapshot(),
    }))
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}
