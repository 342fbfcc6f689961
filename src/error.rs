use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

use crate::lifecycle::IllegalTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    Timeout,
    StorageFailure,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct CoreError {
    kind: ErrorKind,
    message: String,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn storage<E: Display>(error: E) -> Self {
        Self::new(ErrorKind::StorageFailure, error.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// Postgres reports SQLSTATE 57014 with this text; diesel folds it into `Unknown`.
const STATEMENT_TIMEOUT_MESSAGE: &str = "canceling statement due to statement timeout";

impl From<DieselError> for CoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => CoreError::not_found("record not found"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                CoreError::conflict(info.message().to_string())
            }
            DieselError::DatabaseError(_, ref info)
                if info.message().contains(STATEMENT_TIMEOUT_MESSAGE) =>
            {
                CoreError::timeout(info.message().to_string())
            }
            other => CoreError::storage(other),
        }
    }
}

impl From<IllegalTransition> for CoreError {
    fn from(value: IllegalTransition) -> Self {
        CoreError::precondition_failed(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_code_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<CoreError> for AppError {
    fn from(value: CoreError) -> Self {
        AppError::new(status_code_for(value.kind), value.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_error(kind: DatabaseErrorKind, message: &str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(message.to_string()))
    }

    #[test]
    fn classifies_missing_rows() {
        let err = CoreError::from(DieselError::NotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn classifies_unique_violations_as_conflicts() {
        let err = CoreError::from(database_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint \"files_content_hash_key\"",
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn classifies_statement_timeouts() {
        let err = CoreError::from(database_error(
            DatabaseErrorKind::Unknown,
            "canceling statement due to statement timeout",
        ));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn everything_else_is_a_storage_failure() {
        let err = CoreError::from(database_error(
            DatabaseErrorKind::ForeignKeyViolation,
            "insert or update on table \"user_files\" violates foreign key constraint",
        ));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        let err = CoreError::from(DieselError::RollbackTransaction);
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn maps_kinds_to_http_statuses() {
        let cases = [
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Conflict, StatusCode::CONFLICT),
            (ErrorKind::PreconditionFailed, StatusCode::PRECONDITION_FAILED),
            (ErrorKind::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (ErrorKind::StorageFailure, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let app: AppError = CoreError::new(kind, "boom").into();
            assert_eq!(app.status(), status);
        }
    }
}
