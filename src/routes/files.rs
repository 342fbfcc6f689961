use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::ReleaseOutcome;
use crate::lifecycle::FileStatus;
use crate::state::AppState;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAX_FILENAME_CHARS: usize = 255;

#[derive(Serialize)]
pub struct UploadFileResponse {
    pub file_id: Uuid,
    pub created: bool,
    pub attached: bool,
}

#[derive(Serialize)]
pub struct DeleteFileResponse {
    pub deleted: bool,
    pub file_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FileStatus>,
}

impl From<ReleaseOutcome> for DeleteFileResponse {
    fn from(outcome: ReleaseOutcome) -> Self {
        match outcome {
            ReleaseOutcome::Released { file_removed } => Self {
                deleted: true,
                file_removed,
                status: None,
            },
            ReleaseOutcome::Retained { status } => Self {
                deleted: false,
                file_removed: false,
                status: Some(status),
            },
        }
    }
}

#[derive(Serialize)]
pub struct ImportFileResponse {
    pub file_id: Uuid,
    pub status: FileStatus,
}

struct PdfUpload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadFileResponse>)> {
    let mut upload: Option<PdfUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::new(err.status(), format!("invalid multipart data: {}", err.body_text()))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(|name| name.trim().to_string());
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            AppError::new(err.status(), format!("failed to read file bytes: {}", err.body_text()))
        })?;
        upload = Some(PdfUpload {
            filename: filename.unwrap_or_default(),
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::bad_request("file field is required")
    })?;
    validate_pdf_upload(&upload, state.config.max_upload_bytes).map_err(|err| {
        warn!(filename = %upload.filename, size_bytes = upload.bytes.len(), "upload rejected at boundary");
        err
    })?;

    let outcome = state
        .store
        .upload_file(user_id, upload.filename, upload.bytes)
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(UploadFileResponse {
            file_id: outcome.file_id,
            created: outcome.created,
            attached: outcome.attached,
        }),
    ))
}

fn validate_pdf_upload(upload: &PdfUpload, max_upload_bytes: usize) -> AppResult<()> {
    if upload.filename.is_empty() {
        return Err(AppError::bad_request("filename is required"));
    }
    if upload.filename.chars().count() > MAX_FILENAME_CHARS {
        return Err(AppError::bad_request(format!(
            "filename must be at most {MAX_FILENAME_CHARS} characters"
        )));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if upload.bytes.len() > max_upload_bytes {
        return Err(AppError::payload_too_large(format!(
            "file is too large, it must be at most {max_upload_bytes} bytes"
        )));
    }
    if let Some(content_type) = upload.content_type.as_deref() {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if !essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
            return Err(AppError::bad_request(
                "invalid file type, only PDF files are allowed",
            ));
        }
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::bad_request("file content is not a PDF document"));
    }
    Ok(())
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path((user_id, file_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DeleteFileResponse>> {
    let outcome = state.store.delete_file(user_id, file_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn import_file(
    State(state): State<AppState>,
    Path((user_id, file_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ImportFileResponse>> {
    state.store.import_file(user_id, file_id).await?;
    Ok(Json(ImportFileResponse {
        file_id,
        status: FileStatus::Imported,
    }))
}
