use std::time::{Duration, Instant};

use diesel::pg::PgConnection;
use diesel::prelude::*;
use tokio::task;
use tracing::warn;

use crate::db::PgPool;
use crate::error::{CoreError, CoreResult, ErrorKind};

// The deadline is enforced inside the blocking task (pool wait,
// `statement_timeout`, pre-commit check). Its result is always awaited: a
// committed unit is never reported as `Timeout`.
#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
    timeout: Duration,
}

impl Storage {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn transaction<T, F>(&self, operation: &'static str, work: F) -> CoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;

        let result =
            task::spawn_blocking(move || run_unit(&pool, timeout, deadline, operation, work))
                .await
                .map_err(|join_err| {
                    CoreError::storage(format!("{operation} task failed: {join_err}"))
                })?;

        if let Err(err) = &result {
            if err.kind() == ErrorKind::Timeout {
                warn!(
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    error = %err,
                    "storage operation timed out"
                );
            }
        }
        result
    }
}

fn run_unit<T, F>(
    pool: &PgPool,
    timeout: Duration,
    deadline: Instant,
    operation: &'static str,
    work: F,
) -> CoreResult<T>
where
    F: FnOnce(&mut PgConnection) -> CoreResult<T>,
{
    let mut pooled = pool.get_timeout(timeout).map_err(|err| {
        CoreError::timeout(format!("timed out waiting for a database connection: {err}"))
    })?;
    let conn: &mut PgConnection = &mut pooled;

    conn.transaction(|conn| {
        // SET cannot take bind parameters; the value is an integer we format ourselves.
        diesel::sql_query(format!(
            "SET LOCAL statement_timeout = {}",
            timeout.as_millis()
        ))
        .execute(conn)?;

        let value = work(conn)?;

        if Instant::now() >= deadline {
            return Err(CoreError::timeout(format!(
                "{operation} exceeded its deadline before commit"
            )));
        }
        Ok(value)
    })
}
