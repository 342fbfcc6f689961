use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgConnection, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{
    AsExpression, ExpressionMethods, FromSqlRow, OptionalExtension, QueryDsl, RunQueryDsl,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ledger::owns_file;
use crate::schema::files;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    InQueue,
    Parsing,
    Error,
    Success,
    Imported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Dequeued,
    ParseFailed,
    ParseSucceeded,
    Imported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} to a file in status {from}")]
pub struct IllegalTransition {
    pub from: FileStatus,
    pub event: FileEvent,
}

#[derive(Debug, Error)]
#[error("unknown file status '{0}'")]
pub struct UnknownStatus(String);

impl FileStatus {
    pub const ALL: [FileStatus; 5] = [
        FileStatus::InQueue,
        FileStatus::Parsing,
        FileStatus::Error,
        FileStatus::Success,
        FileStatus::Imported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::InQueue => "in_queue",
            FileStatus::Parsing => "parsing",
            FileStatus::Error => "error",
            FileStatus::Success => "success",
            FileStatus::Imported => "imported",
        }
    }

    pub fn apply(self, event: FileEvent) -> Result<FileStatus, IllegalTransition> {
        match (self, event) {
            (FileStatus::InQueue, FileEvent::Dequeued) => Ok(FileStatus::Parsing),
            (FileStatus::Parsing, FileEvent::ParseFailed) => Ok(FileStatus::Error),
            (FileStatus::Parsing, FileEvent::ParseSucceeded) => Ok(FileStatus::Success),
            (FileStatus::Success, FileEvent::Imported) => Ok(FileStatus::Imported),
            (from, event) => Err(IllegalTransition { from, event }),
        }
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, FileStatus::InQueue)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FileStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

impl ToSql<Text, Pg> for FileStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for FileStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(raw.parse::<FileStatus>()?)
    }
}

pub fn import_file(conn: &mut PgConnection, user_id: Uuid, file_id: Uuid) -> CoreResult<()> {
    let current: FileStatus = files::table
        .find(file_id)
        .select(files::status)
        .for_no_key_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("file {file_id} not found")))?;

    if !owns_file(conn, user_id, file_id)? {
        return Err(CoreError::not_found(format!(
            "user {user_id} does not own file {file_id}"
        )));
    }

    let next_status = current.apply(FileEvent::Imported).map_err(|_| {
        CoreError::precondition_failed(format!("file is not parsed (status {current})"))
    })?;

    diesel::update(files::table.find(file_id))
        .set((
            files::status.eq(next_status),
            files::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!(user_id = %user_id, file_id = %file_id, "file imported");
    Ok(())
}
