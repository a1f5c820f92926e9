//! Generic collection commands: list/get/create/update/delete/restore.
//!
//! These are the operations the view layer dispatches. Deletes are soft
//! (stamp `deleted_at`) and reversible via restore; reads only ever see
//! live rows.

use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::{
    gateway::{self, Filter},
    id::new_uuid_v7,
    time::now_ms,
    AppError, AppResult,
};

fn household_scoped(collection: &str) -> bool {
    !gateway::UNSCOPED.contains(&collection)
}

fn live_filters(collection: &str, household_id: Option<&str>) -> Vec<Filter> {
    let mut filters = vec![Filter::Eq("deleted_at", Value::Null)];
    if household_scoped(collection) {
        if let Some(hh) = household_id {
            filters.push(Filter::Eq("household_id", Value::from(hh.to_string())));
        }
    }
    filters
}

async fn list(
    pool: &SqlitePool,
    collection: &str,
    household_id: &str,
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<Value>> {
    let filters = live_filters(collection, Some(household_id));
    let rows = gateway::select(
        pool,
        collection,
        &filters,
        Some(order_by.unwrap_or("created_at, id")),
        limit,
        offset,
    )
    .await?;
    Ok(rows.into_iter().map(gateway::row_to_json).collect())
}

async fn get(
    pool: &SqlitePool,
    collection: &str,
    household_id: Option<&str>,
    id: &str,
) -> AppResult<Option<Value>> {
    let mut filters = live_filters(collection, household_id);
    filters.push(Filter::Eq("id", Value::from(id.to_string())));
    let rows = gateway::select(pool, collection, &filters, None, Some(1), None).await?;
    Ok(rows.into_iter().next().map(gateway::row_to_json))
}

async fn create(
    pool: &SqlitePool,
    collection: &str,
    mut data: Map<String, Value>,
) -> AppResult<Value> {
    let id = data
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(new_uuid_v7);
    data.insert("id".into(), Value::String(id));
    let now = now_ms();
    data.entry(String::from("created_at"))
        .or_insert(Value::from(now));
    data.insert("updated_at".into(), Value::from(now));

    gateway::insert(pool, collection, &data).await?;
    Ok(Value::Object(data))
}

async fn update(
    pool: &SqlitePool,
    collection: &str,
    id: &str,
    mut data: Map<String, Value>,
    household_id: Option<&str>,
) -> AppResult<()> {
    gateway::ensure_mutable(collection)?;
    data.remove("id");
    data.remove("created_at");
    data.insert("updated_at".into(), Value::from(now_ms()));

    let mut filters = vec![Filter::Eq("id", Value::from(id.to_string()))];
    if household_scoped(collection) {
        let hh = household_id.unwrap_or("");
        filters.push(Filter::Eq("household_id", Value::from(hh.to_string())));
    }
    gateway::update(pool, collection, &data, &filters).await?;
    Ok(())
}

async fn set_deleted(
    pool: &SqlitePool,
    collection: &str,
    household_id: &str,
    id: &str,
    deleted_at: Value,
) -> AppResult<()> {
    gateway::ensure_mutable(collection)?;
    let now = now_ms();
    let mut patch = Map::new();
    patch.insert("deleted_at".into(), deleted_at);
    patch.insert("updated_at".into(), Value::from(now));

    let mut filters = vec![Filter::Eq("id", Value::from(id.to_string()))];
    if household_scoped(collection) {
        filters.push(Filter::Eq(
            "household_id",
            Value::from(household_id.to_string()),
        ));
    }
    let affected = gateway::update(pool, collection, &patch, &filters).await?;
    if affected == 0 {
        return Err(AppError::new("COMMANDS/NOT_FOUND", "Record not found")
            .with_context("id", id.to_string()));
    }
    Ok(())
}

pub async fn list_command(
    pool: &SqlitePool,
    collection: &str,
    household_id: &str,
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<Value>> {
    list(pool, collection, household_id, order_by, limit, offset)
        .await
        .map_err(|err| {
            err.with_context("operation", "list")
                .with_context("collection", collection.to_string())
                .with_context("household_id", household_id.to_string())
        })
}

pub async fn get_command(
    pool: &SqlitePool,
    collection: &str,
    household_id: Option<&str>,
    id: &str,
) -> AppResult<Option<Value>> {
    get(pool, collection, household_id, id).await.map_err(|err| {
        err.with_context("operation", "get")
            .with_context("collection", collection.to_string())
            .with_context("id", id.to_string())
    })
}

pub async fn create_command(
    pool: &SqlitePool,
    collection: &str,
    data: Map<String, Value>,
) -> AppResult<Value> {
    create(pool, collection, data).await.map_err(|err| {
        err.with_context("operation", "create")
            .with_context("collection", collection.to_string())
    })
}

pub async fn update_command(
    pool: &SqlitePool,
    collection: &str,
    id: &str,
    data: Map<String, Value>,
    household_id: Option<&str>,
) -> AppResult<()> {
    update(pool, collection, id, data, household_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "update")
                .with_context("collection", collection.to_string())
                .with_context("id", id.to_string())
        })
}

pub async fn delete_command(
    pool: &SqlitePool,
    collection: &str,
    household_id: &str,
    id: &str,
) -> AppResult<()> {
    set_deleted(pool, collection, household_id, id, Value::from(now_ms()))
        .await
        .map_err(|err| {
            err.with_context("operation", "delete")
                .with_context("collection", collection.to_string())
                .with_context("household_id", household_id.to_string())
                .with_context("id", id.to_string())
        })
}

pub async fn restore_command(
    pool: &SqlitePool,
    collection: &str,
    household_id: &str,
    id: &str,
) -> AppResult<()> {
    set_deleted(pool, collection, household_id, id, Value::Null)
        .await
        .map_err(|err| {
            err.with_context("operation", "restore")
                .with_context("collection", collection.to_string())
                .with_context("household_id", household_id.to_string())
                .with_context("id", id.to_string())
        })
}
