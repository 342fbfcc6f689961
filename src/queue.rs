use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{FileEvent, FileStatus};
use crate::models::NewQueueItem;
use crate::schema::{files, queue};

#[derive(Debug, Clone)]
pub struct DequeuedFile {
    pub file_id: Uuid,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub status: Option<FileStatus>,
    pub parsed_payload: Option<Vec<u8>>,
    pub parse_error: Option<String>,
}

pub fn enqueue(conn: &mut PgConnection, file_id: Uuid, bytes: &[u8]) -> CoreResult<i64> {
    let item_id = diesel::insert_into(queue::table)
        .values(&NewQueueItem {
            file_id,
            payload: bytes,
        })
        .returning(queue::id)
        .get_result(conn)?;
    info!(file_id = %file_id, queue_item_id = item_id, size_bytes = bytes.len(), "file queued for parsing");
    Ok(item_id)
}

// SKIP LOCKED: rows held by another worker or a delete are passed over, so
// no item is handed out twice and the call never waits.
pub fn dequeue_next(conn: &mut PgConnection) -> CoreResult<DequeuedFile> {
    let next = queue::table
        .inner_join(files::table)
        .order(queue::id.asc())
        .select((
            queue::id,
            queue::file_id,
            queue::payload,
            files::filename,
            files::status,
        ))
        .for_no_key_update()
        .skip_locked()
        .first::<(i64, Uuid, Vec<u8>, String, FileStatus)>(conn)
        .optional()?;

    let Some((item_id, file_id, bytes, filename, status)) = next else {
        return Err(CoreError::not_found("queue is empty"));
    };

    let next_status = status.apply(FileEvent::Dequeued)?;

    diesel::delete(queue::table.find(item_id)).execute(conn)?;
    diesel::update(files::table.find(file_id))
        .set((
            files::status.eq(next_status),
            files::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!(file_id = %file_id, queue_item_id = item_id, "file handed to parser");
    Ok(DequeuedFile {
        file_id,
        filename,
        bytes,
    })
}

pub fn report_result(
    conn: &mut PgConnection,
    file_id: Uuid,
    report: ParseReport,
) -> CoreResult<FileStatus> {
    let current: FileStatus = files::table
        .find(file_id)
        .select(files::status)
        .for_no_key_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("file {file_id} not found")))?;

    let ParseReport {
        status,
        parsed_payload,
        parse_error,
    } = report;
    let parse_error = parse_error.filter(|message| !message.is_empty());

    let event = match (&parse_error, status) {
        (Some(_), _) => FileEvent::ParseFailed,
        (None, Some(FileStatus::Success)) => FileEvent::ParseSucceeded,
        (None, Some(FileStatus::Error)) => FileEvent::ParseFailed,
        (None, Some(other)) => {
            return Err(CoreError::precondition_failed(format!(
                "parse result must be success or error, got {other}"
            )))
        }
        (None, None) => {
            return Err(CoreError::precondition_failed(
                "parse result needs a status or an error",
            ))
        }
    };

    let next_status = current.apply(event)?;
    let parsed_payload = match next_status {
        FileStatus::Success => parsed_payload,
        _ => None,
    };

    diesel::update(files::table.find(file_id))
        .set((
            files::status.eq(next_status),
            files::parsed_payload.eq(parsed_payload),
            files::parse_error.eq(parse_error),
            files::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!(file_id = %file_id, status = %next_status, "parse result recorded");
    Ok(next_status)
}

pub fn queue_depth(conn: &mut PgConnection) -> CoreResult<i64> {
    let depth = queue::table.count().get_result(conn)?;
    Ok(depth)
}
