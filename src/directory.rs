use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::select;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::FileStatus;
use crate::models::{NewUser, User};
use crate::schema::{files, user_files, users};

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct UserFileEntry {
    pub file_id: Uuid,
    pub filename: String,
    pub upload_date: NaiveDateTime,
    pub status: FileStatus,
}

pub fn create_user(conn: &mut PgConnection) -> CoreResult<User> {
    let user = diesel::insert_into(users::table)
        .values(&NewUser { id: Uuid::new_v4() })
        .get_result(conn)?;
    Ok(user)
}

pub fn user_exists(conn: &mut PgConnection, user_id: Uuid) -> CoreResult<bool> {
    let found = select(exists(users::table.find(user_id))).get_result(conn)?;
    Ok(found)
}

pub fn require_user(conn: &mut PgConnection, user_id: Uuid) -> CoreResult<()> {
    if user_exists(conn, user_id)? {
        Ok(())
    } else {
        Err(CoreError::not_found(format!("user {user_id} not found")))
    }
}

pub fn list_user_files(conn: &mut PgConnection, user_id: Uuid) -> CoreResult<Vec<UserFileEntry>> {
    require_user(conn, user_id)?;

    let entries = user_files::table
        .inner_join(files::table)
        .filter(user_files::user_id.eq(user_id))
        .order((user_files::upload_date.desc(), user_files::file_id.asc()))
        .select((
            user_files::file_id,
            user_files::filename,
            user_files::upload_date,
            files::status,
        ))
        .load::<UserFileEntry>(conn)?;
    Ok(entries)
}
