use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.queue_depth().await {
        Ok(depth) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "queue_depth": depth })),
        ),
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
