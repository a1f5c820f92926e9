use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result as AnyResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite, SqlitePool, Transaction};

use crate::{AppError, AppResult};

pub async fn open_sqlite_pool(db_path: &Path) -> AnyResult<Pool<Sqlite>> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            tracing::error!(
                target = "hearth",
                error = %e,
                event = "data_dir_create_failed",
                path = %parent.display()
            );
            e
        })?;
    }
    tracing::info!(target = "hearth", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::from_str(db_path.to_str().context("database path is not UTF-8")?)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await?;

    log_effective_pragmas(&pool).await;

    Ok(pool)
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    use tracing::{info, warn};

    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target: "hearth",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        foreign_keys = %fks.0
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        warn!(
            target = "hearth",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}

/// Run work inside a transaction. Commits on success, rolls back on error.
pub async fn run_in_tx<R, E, F>(pool: &SqlitePool, f: F) -> Result<R, E>
where
    E: From<sqlx::Error>,
    F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<R, E>>,
{
    use tracing::{debug, error, warn};

    let mut tx = pool.begin().await.map_err(E::from)?;
    debug!(target = "hearth", event = "db_tx_begin");
    match f(&mut tx).await {
        Ok(val) => {
            tx.commit().await.map_err(E::from)?;
            debug!(target = "hearth", event = "db_tx_commit");
            Ok(val)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                error!(target = "hearth", event = "db_tx_rollback_failed", error = %rb);
            } else {
                warn!(target = "hearth", event = "db_tx_rollback");
            }
            Err(e)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbHealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbHealthReport {
    pub status: DbHealthStatus,
    pub checks: Vec<HealthCheck>,
    pub migrations_applied: i64,
    pub generated_at: String,
}

async fn run_check<F>(name: &str, fut: F) -> HealthCheck
where
    F: std::future::Future<Output = Result<Option<String>, sqlx::Error>>,
{
    let started = std::time::Instant::now();
    let (passed, details) = match fut.await {
        Ok(details) => (details.is_none(), details),
        Err(err) => (false, Some(err.to_string())),
    };
    HealthCheck {
        name: name.to_string(),
        passed,
        duration_ms: started.elapsed().as_millis(),
        details,
    }
}

/// Integrity and consistency checks surfaced by `hearth db status`.
pub async fn run_health_checks(pool: &SqlitePool) -> AppResult<DbHealthReport> {
    let quick = run_check("quick_check", async {
        let (result,): (String,) = sqlx::query_as("PRAGMA quick_check;").fetch_one(pool).await?;
        Ok(if result.eq_ignore_ascii_case("ok") {
            None
        } else {
            Some(result)
        })
    })
    .await;

    let fk = run_check("foreign_key_check", async {
        let rows = sqlx::query("PRAGMA foreign_key_check;").fetch_all(pool).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(format!("{} violation(s)", rows.len()))
        })
    })
    .await;

    let has_migrations_table: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
    )
    .fetch_optional(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "db_status"))?;

    let migrations_applied: i64 = if has_migrations_table.is_some() {
        sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(pool)
            .await
            .map_err(AppError::from)?
    } else {
        0
    };

    let checks = vec![quick, fk];
    let status = if checks.iter().all(|c| c.passed) {
        DbHealthStatus::Ok
    } else {
        DbHealthStatus::Error
    };

    Ok(DbHealthReport {
        status,
        checks,
        migrations_applied,
        generated_at: crate::time::to_date(crate::time::now_ms()).to_rfc3339(),
    })
}
