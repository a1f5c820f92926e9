use anyhow::Result;
use sqlx::Row;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn migrations_apply_once_and_are_idempotent() -> Result<()> {
    let pool = util::memory_pool().await?;

    let first: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(&pool)
        .await?;
    assert!(first > 0);

    hearth_lib::migrate::apply_migrations(&pool).await?;
    let second: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(&pool)
        .await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn migrations_create_every_collection_table() -> Result<()> {
    let pool = util::memory_pool().await?;
    for collection in hearth_lib::gateway::COLLECTIONS {
        let present: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(collection)
        .fetch_optional(&pool)
        .await?;
        assert!(present.is_some(), "missing table for {collection}");
    }
    Ok(())
}

#[tokio::test]
async fn edited_migration_is_refused() -> Result<()> {
    let pool = util::memory_pool().await?;

    let version: String = sqlx::query("SELECT version FROM schema_migrations LIMIT 1")
        .fetch_one(&pool)
        .await?
        .try_get("version")?;
    sqlx::query("UPDATE schema_migrations SET checksum = 'tampered' WHERE version = ?")
        .bind(&version)
        .execute(&pool)
        .await?;

    let err = hearth_lib::migrate::apply_migrations(&pool)
        .await
        .expect_err("checksum mismatch should refuse to continue");
    assert!(err.to_string().contains("edited after application"));
    Ok(())
}
