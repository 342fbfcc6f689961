use diesel::dsl::{count_star, exists};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::select;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::lifecycle::FileStatus;
use crate::models::{File, NewFile, NewUserFile};
use crate::schema::{files, user_files};

pub const CONTENT_HASH_LEN: usize = 32;

pub type ContentHash = [u8; CONTENT_HASH_LEN];

const RESOLVE_ATTEMPTS: usize = 3;

pub fn content_hash(bytes: &[u8]) -> ContentHash {
    Sha256::digest(bytes).into()
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub file: File,
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { file_removed: bool },
    Retained { status: FileStatus },
}

// Must run inside a transaction: the insert uses a savepoint, and a unique
// violation only rolls that back before the lookup is repeated.
pub fn resolve_or_create(
    conn: &mut PgConnection,
    hash: &ContentHash,
    filename: &str,
) -> CoreResult<Resolved> {
    for attempt in 1..=RESOLVE_ATTEMPTS {
        if let Some(file) = find_by_hash(conn, hash)? {
            return Ok(Resolved {
                file,
                is_new: false,
            });
        }

        let new_file = NewFile {
            id: Uuid::new_v4(),
            filename,
            content_hash: &hash[..],
            status: FileStatus::InQueue,
        };

        let inserted = conn.transaction::<File, DieselError, _>(|conn| {
            diesel::insert_into(files::table)
                .values(&new_file)
                .get_result(conn)
        });

        match inserted {
            Ok(file) => {
                return Ok(Resolved {
                    file,
                    is_new: true,
                })
            }
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                debug!(
                    attempt,
                    content_hash = %hex::encode(hash),
                    "content hash inserted concurrently; retrying lookup"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(CoreError::conflict(format!(
        "could not settle file for content hash {} after {RESOLVE_ATTEMPTS} attempts",
        hex::encode(hash)
    )))
}

// KEY SHARE keeps a concurrent last-owner delete from removing the row while
// this transaction attaches to it.
fn find_by_hash(conn: &mut PgConnection, hash: &ContentHash) -> CoreResult<Option<File>> {
    let file = files::table
        .filter(files::content_hash.eq(&hash[..]))
        .for_key_share()
        .first::<File>(conn)
        .optional()?;
    Ok(file)
}

pub fn owns_file(conn: &mut PgConnection, user_id: Uuid, file_id: Uuid) -> CoreResult<bool> {
    let owned = select(exists(
        user_files::table
            .filter(user_files::user_id.eq(user_id))
            .filter(user_files::file_id.eq(file_id)),
    ))
    .get_result(conn)?;
    Ok(owned)
}

pub fn attach_ownership(
    conn: &mut PgConnection,
    user_id: Uuid,
    file_id: Uuid,
    filename: &str,
) -> CoreResult<bool> {
    if owns_file(conn, user_id, file_id)? {
        return Ok(false);
    }

    let inserted = diesel::insert_into(user_files::table)
        .values(&NewUserFile {
            user_id,
            file_id,
            filename,
        })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(inserted == 1)
}

pub fn release_ownership(
    conn: &mut PgConnection,
    user_id: Uuid,
    file_id: Uuid,
) -> CoreResult<ReleaseOutcome> {
    let status: FileStatus = files::table
        .find(file_id)
        .select(files::status)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("file {file_id} not found")))?;

    if !owns_file(conn, user_id, file_id)? {
        return Err(CoreError::not_found(format!(
            "user {user_id} does not own file {file_id}"
        )));
    }

    if !status.is_deletable() {
        return Ok(ReleaseOutcome::Retained { status });
    }

    diesel::delete(
        user_files::table
            .filter(user_files::user_id.eq(user_id))
            .filter(user_files::file_id.eq(file_id)),
    )
    .execute(conn)?;

    let remaining: i64 = user_files::table
        .filter(user_files::file_id.eq(file_id))
        .select(count_star())
        .first(conn)?;

    let file_removed = remaining == 0;
    if file_removed {
        // The queue row goes with it through ON DELETE CASCADE.
        diesel::delete(files::table.find(file_id)).execute(conn)?;
    }

    Ok(ReleaseOutcome::Released { file_removed })
}

pub fn purge_orphaned_files(conn: &mut PgConnection) -> CoreResult<usize> {
    let removed = diesel::delete(
        files::table
            .filter(files::status.eq(FileStatus::InQueue))
            .filter(files::id.ne_all(user_files::table.select(user_files::file_id))),
    )
    .execute(conn)?;

    if removed > 0 {
        info!(removed, "purged orphaned queued files");
    }
    Ok(removed)
}
