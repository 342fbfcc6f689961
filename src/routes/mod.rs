use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod files;
pub mod health;
pub mod queue;
pub mod users;

// Multipart framing headroom.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = %value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    };

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let users_routes = Router::new()
        .route("/", post(users::create_user))
        .route(
            "/:user_id/files",
            get(users::list_user_files).post(files::upload_file),
        )
        .route("/:user_id/files/:file_id", delete(files::delete_file))
        .route("/:user_id/files/:file_id/import", post(files::import_file));

    let queue_routes = Router::new()
        .route("/next", post(queue::dequeue_next))
        .route("/:file_id/result", post(queue::report_result));

    Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/queue", queue_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
