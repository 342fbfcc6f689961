use axum::extract::{Json, Path, State};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult, CoreError};
use crate::lifecycle::FileStatus;
use crate::queue::ParseReport;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DequeuedFileResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub payload: String,
}

#[derive(Deserialize)]
pub struct ParseResultRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub parsed_payload: Option<String>,
    #[serde(default)]
    pub parse_error: Option<String>,
}

#[derive(Serialize)]
pub struct ParseResultResponse {
    pub file_id: Uuid,
    pub status: FileStatus,
}

pub async fn dequeue_next(State(state): State<AppState>) -> AppResult<Json<DequeuedFileResponse>> {
    let next = state.store.dequeue_next().await?;
    Ok(Json(DequeuedFileResponse {
        file_id: next.file_id,
        filename: next.filename,
        payload: STANDARD.encode(next.bytes),
    }))
}

pub async fn report_result(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Json(payload): Json<ParseResultRequest>,
) -> AppResult<Json<ParseResultResponse>> {
    let parsed_payload = payload
        .parsed_payload
        .map(|encoded| STANDARD.decode(encoded))
        .transpose()
        .map_err(|err| AppError::bad_request(format!("parsed_payload must be base64: {err}")))?;
    let requested = payload
        .status
        .as_deref()
        .map(str::parse::<FileStatus>)
        .transpose()
        .map_err(|err| AppError::from(CoreError::precondition_failed(err.to_string())))?;

    let status = state
        .store
        .report_parse_result(
            file_id,
            ParseReport {
                status: requested,
                parsed_payload,
                parse_error: payload.parse_error,
            },
        )
        .await?;

    Ok(Json(ParseResultResponse { file_id, status }))
}
