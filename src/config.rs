use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub operation_timeout: Duration,
    pub max_upload_bytes: usize,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let operation_timeout_ms: u64 = env::var("OPERATION_TIMEOUT_MS")
            .unwrap_or_else(|_| DEFAULT_OPERATION_TIMEOUT_MS.to_string())
            .parse()
            .context("OPERATION_TIMEOUT_MS must be an integer")?;
        anyhow::ensure!(
            operation_timeout_ms > 0,
            "OPERATION_TIMEOUT_MS must be greater than zero"
        );
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .context("MAX_UPLOAD_BYTES must be an integer")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            operation_timeout: Duration::from_millis(operation_timeout_ms),
            max_upload_bytes,
            cors_allowed_origin,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
