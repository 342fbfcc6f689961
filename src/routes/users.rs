use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use super::to_iso;
use crate::directory::UserFileEntry;
use crate::error::AppResult;
use crate::lifecycle::FileStatus;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct UserFileResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub upload_date: String,
    pub status: FileStatus,
}

impl From<UserFileEntry> for UserFileResponse {
    fn from(entry: UserFileEntry) -> Self {
        Self {
            file_id: entry.file_id,
            filename: entry.filename,
            upload_date: to_iso(entry.upload_date),
            status: entry.status,
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let id = state.store.create_user().await?;
    Ok((StatusCode::CREATED, Json(CreateUserResponse { id })))
}

pub async fn list_user_files(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<UserFileResponse>>> {
    let entries = state.store.list_user_files(user_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
