use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::lifecycle::FileStatus;
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = files)]
pub struct File {
    pub id: Uuid,
    pub filename: String,
    pub content_hash: Vec<u8>,
    pub parsed_payload: Option<Vec<u8>>,
    pub parse_error: Option<String>,
    pub status: FileStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFile<'a> {
    pub id: Uuid,
    pub filename: &'a str,
    pub content_hash: &'a [u8],
    pub status: FileStatus,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = user_files)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(File))]
#[diesel(primary_key(user_id, file_id))]
pub struct UserFile {
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub filename: String,
    pub upload_date: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_files)]
pub struct NewUserFile<'a> {
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub filename: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = queue)]
#[diesel(belongs_to(File))]
pub struct QueueItem {
    pub id: i64,
    pub file_id: Uuid,
    pub payload: Vec<u8>,
    pub enqueued_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = queue)]
pub struct NewQueueItem<'a> {
    pub file_id: Uuid,
    pub payload: &'a [u8],
}
