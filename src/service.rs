use tracing::{error, info, warn};
use uuid::Uuid;

use crate::directory::{self, UserFileEntry};
use crate::error::{CoreResult, ErrorKind};
use crate::ledger::{self, ReleaseOutcome};
use crate::lifecycle::{self, FileStatus};
use crate::queue::{self, DequeuedFile, ParseReport};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_id: Uuid,
    pub created: bool,
    pub attached: bool,
}

#[derive(Clone)]
pub struct PdfStore {
    storage: Storage,
}

impl PdfStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn create_user(&self) -> CoreResult<Uuid> {
        let user = self
            .storage
            .transaction("create_user", directory::create_user)
            .await?;
        info!(user_id = %user.id, "user created");
        Ok(user.id)
    }

    pub async fn upload_file(
        &self,
        user_id: Uuid,
        filename: String,
        bytes: Vec<u8>,
    ) -> CoreResult<UploadOutcome> {
        let hash = ledger::content_hash(&bytes);
        let size_bytes = bytes.len();

        let result = self
            .storage
            .transaction("upload_file", move |conn| {
                directory::require_user(conn, user_id)?;
                let resolved = ledger::resolve_or_create(conn, &hash, &filename)?;
                let file_id = resolved.file.id;
                let attached = ledger::attach_ownership(conn, user_id, file_id, &filename)?;
                if resolved.is_new {
                    queue::enqueue(conn, file_id, &bytes)?;
                }
                Ok(UploadOutcome {
                    file_id,
                    created: resolved.is_new,
                    attached,
                })
            })
            .await;

        match result {
            Ok(outcome) => {
                info!(
                    user_id = %user_id,
                    file_id = %outcome.file_id,
                    content_hash = %hex::encode(hash),
                    size_bytes,
                    created = outcome.created,
                    reused_existing = !outcome.created,
                    attached = outcome.attached,
                    "file upload succeeded"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(user_id = %user_id, error = %err, kind = ?err.kind(), "file upload failed");
                Err(err)
            }
        }
    }

    pub async fn delete_file(&self, user_id: Uuid, file_id: Uuid) -> CoreResult<ReleaseOutcome> {
        let outcome = self
            .storage
            .transaction("delete_file", move |conn| {
                ledger::release_ownership(conn, user_id, file_id)
            })
            .await?;

        match outcome {
            ReleaseOutcome::Released { file_removed } => {
                info!(user_id = %user_id, file_id = %file_id, file_removed, "file ownership released");
            }
            ReleaseOutcome::Retained { status } => {
                info!(user_id = %user_id, file_id = %file_id, %status, "file past queue, delete skipped");
            }
        }
        Ok(outcome)
    }

    pub async fn import_file(&self, user_id: Uuid, file_id: Uuid) -> CoreResult<()> {
        self.storage
            .transaction("import_file", move |conn| {
                lifecycle::import_file(conn, user_id, file_id)
            })
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::PreconditionFailed {
                    warn!(user_id = %user_id, file_id = %file_id, error = %err, "import rejected");
                }
                err
            })
    }

    pub async fn dequeue_next(&self) -> CoreResult<DequeuedFile> {
        self.storage
            .transaction("dequeue_next", queue::dequeue_next)
            .await
    }

    pub async fn report_parse_result(
        &self,
        file_id: Uuid,
        report: ParseReport,
    ) -> CoreResult<FileStatus> {
        self.storage
            .transaction("report_parse_result", move |conn| {
                queue::report_result(conn, file_id, report)
            })
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::PreconditionFailed {
                    warn!(file_id = %file_id, error = %err, "parse result rejected");
                }
                err
            })
    }

    pub async fn list_user_files(&self, user_id: Uuid) -> CoreResult<Vec<UserFileEntry>> {
        self.storage
            .transaction("list_user_files", move |conn| {
                directory::list_user_files(conn, user_id)
            })
            .await
    }

    pub async fn queue_depth(&self) -> CoreResult<i64> {
        self.storage
            .transaction("queue_depth", queue::queue_depth)
            .await
    }

    pub async fn purge_orphaned_files(&self) -> CoreResult<usize> {
        self.storage
            .transaction("purge_orphaned_files", ledger::purge_orphaned_files)
            .await
    }
}
