use std::env;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use pdf_ingest::config::AppConfig;
use pdf_ingest::db::{self, PgPool, MIGRATIONS};
use pdf_ingest::lifecycle::FileStatus;
use pdf_ingest::models::{File, QueueItem, UserFile};
use pdf_ingest::routes;
use pdf_ingest::schema::{files, queue, user_files, users};
use pdf_ingest::service::PdfStore;
use pdf_ingest::state::AppState;
use pdf_ingest::storage::Storage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
pub const TEST_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Returns `None` when no test database is configured.
    pub async fn new() -> Result<Option<Self>> {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(operation_timeout: Duration) -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            operation_timeout,
            max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Storage::new(pool, config.operation_timeout);
        let state = AppState::new(PdfStore::new(storage), config);
        let router = routes::create_router(state.clone());

        Ok(Some(Self { state, router }))
    }

    pub fn store(&self) -> &PdfStore {
        &self.state.store
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    pub async fn create_user(&self) -> Result<Uuid> {
        #[derive(serde::Deserialize)]
        struct Created {
            id: Uuid,
        }

        let response = self.post_empty("/api/users").await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "create user failed with status {}",
            response.status()
        );
        let created: Created = read_json(response).await?;
        Ok(created.id)
    }

    pub async fn upload_pdf(
        &self,
        user_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<hyper::Response<Body>> {
        self.upload_file(user_id, filename, "application/pdf", data)
            .await
    }

    pub async fn upload_file(
        &self,
        user_id: Uuid,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/users/{user_id}/files"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))?;
        self.send(request).await
    }

    /// Uploads and returns the file id, failing on anything but 200/201.
    #[allow(dead_code)]
    pub async fn upload_ok(&self, user_id: Uuid, filename: &str, data: &[u8]) -> Result<Uuid> {
        #[derive(serde::Deserialize)]
        struct Uploaded {
            file_id: Uuid,
        }

        let response = self.upload_pdf(user_id, filename, data).await?;
        ensure!(
            response.status().is_success(),
            "upload failed with status {}",
            response.status()
        );
        let uploaded: Uploaded = read_json(response).await?;
        Ok(uploaded.file_id)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        self.send(request).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn files_with_content(&self, data: &[u8]) -> Result<Vec<File>> {
        let hash = pdf_ingest::ledger::content_hash(data).to_vec();
        self.with_conn(move |conn| {
            let rows = files::table
                .filter(files::content_hash.eq(&hash))
                .load::<File>(conn)
                .context("failed to load files")?;
            Ok(rows)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn file_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = files::table
                .count()
                .get_result(conn)
                .context("failed to count files")?;
            Ok(count)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn owners_of(&self, file_id: Uuid) -> Result<Vec<UserFile>> {
        self.with_conn(move |conn| {
            let rows = user_files::table
                .filter(user_files::file_id.eq(file_id))
                .load::<UserFile>(conn)
                .context("failed to load user files")?;
            Ok(rows)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn file_status(&self, file_id: Uuid) -> Result<Option<FileStatus>> {
        self.with_conn(move |conn| {
            let status = files::table
                .find(file_id)
                .select(files::status)
                .first::<FileStatus>(conn)
                .optional()
                .context("failed to load file status")?;
            Ok(status)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn file(&self, file_id: Uuid) -> Result<File> {
        self.with_conn(move |conn| {
            let file = files::table
                .find(file_id)
                .first::<File>(conn)
                .context("failed to load file")?;
            Ok(file)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn queue_items(&self) -> Result<Vec<QueueItem>> {
        self.with_conn(|conn| {
            let rows = queue::table
                .order(queue::id.asc())
                .load::<QueueItem>(conn)
                .context("failed to load queue")?;
            Ok(rows)
        })
        .await
    }

    /// Removes a user directly, cascading to their ownership rows only.
    #[allow(dead_code)]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::delete(users::table.find(user_id))
                .execute(conn)
                .context("failed to delete user")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn execute_sql(&self, sql: &'static str) -> Result<()> {
        self.with_conn(move |conn| {
            conn.batch_execute(sql).context("failed to execute sql")?;
            Ok(())
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.store.storage().pool().clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).context("failed to decode response body")
}

/// A small but well-formed looking PDF whose bytes differ per `marker`.
#[allow(dead_code)]
pub fn pdf_bytes(marker: &str) -> Vec<u8> {
    format!("%PDF-1.7\n% {marker}\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n").into_bytes()
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE queue, user_files, files, users RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
