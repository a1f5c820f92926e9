//! Grocery lists and their line items, including the end-of-week archive
//! that feeds the purchase-history aggregation.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::{
    commands,
    db::run_in_tx,
    gateway::{self, Filter},
    id::new_uuid_v7,
    time::{now_ms, week_start_of},
    AppError, AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct List {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub list_type: String,
    #[ts(type = "number")]
    pub position: i64,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for List {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            household_id: row.try_get("household_id").map_err(AppError::from)?,
            name: row.try_get("name").map_err(AppError::from)?,
            list_type: row.try_get("list_type").map_err(AppError::from)?,
            position: row.try_get("position").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
            deleted_at: row
                .try_get::<Option<i64>, _>("deleted_at")
                .map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ListItem {
    pub id: String,
    pub household_id: String,
    pub list_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub quantity: Option<String>,
    pub completed: bool,
    #[ts(type = "number")]
    pub position: i64,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for ListItem {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            household_id: row.try_get("household_id").map_err(AppError::from)?,
            list_id: row.try_get("list_id").map_err(AppError::from)?,
            text: row.try_get("text").map_err(AppError::from)?,
            quantity: row
                .try_get::<Option<String>, _>("quantity")
                .map_err(AppError::from)?,
            completed: row.try_get::<i64, _>("completed").map_err(AppError::from)? != 0,
            position: row.try_get("position").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
            deleted_at: row
                .try_get::<Option<i64>, _>("deleted_at")
                .map_err(AppError::from)?,
        })
    }
}

pub async fn create_list(
    pool: &SqlitePool,
    household_id: &str,
    name: &str,
    list_type: &str,
) -> AppResult<List> {
    let mut data = Map::new();
    data.insert("household_id".into(), Value::from(household_id.to_string()));
    data.insert("name".into(), Value::from(name.to_string()));
    data.insert("list_type".into(), Value::from(list_type.to_string()));
    data.insert("position".into(), Value::from(0));
    let created = commands::create_command(pool, "lists", data).await?;
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::new("LIST/DECODE", "Created list is missing an id"))?;
    get_list(pool, household_id, id)
        .await?
        .ok_or_else(|| AppError::new("LIST/NOT_FOUND", "List not found after create"))
}

pub async fn get_list(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
) -> AppResult<Option<List>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("id", Value::from(id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
    ];
    let rows = gateway::select(pool, "lists", &filters, None, Some(1), None).await?;
    rows.first().map(List::try_from).transpose()
}

/// Live items of a list in display order.
pub async fn list_items(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
) -> AppResult<Vec<ListItem>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("list_id", Value::from(list_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
    ];
    let rows = gateway::select(
        pool,
        "list_items",
        &filters,
        Some("position, created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list")
            .with_context("collection", "list_items".to_string())
            .with_context("list_id", list_id.to_string())
    })?;
    rows.iter().map(ListItem::try_from).collect()
}

pub async fn add_item(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
    text: &str,
    quantity: Option<&str>,
) -> AppResult<ListItem> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::new(
            "LIST_ITEM/EMPTY_TEXT",
            "Item text must not be empty",
        ));
    }

    let mut data = Map::new();
    data.insert("household_id".into(), Value::from(household_id.to_string()));
    data.insert("list_id".into(), Value::from(list_id.to_string()));
    data.insert("text".into(), Value::from(text.to_string()));
    data.insert(
        "quantity".into(),
        quantity
            .map(|q| Value::from(q.to_string()))
            .unwrap_or(Value::Null),
    );
    data.insert("completed".into(), Value::from(0));
    data.insert("position".into(), Value::from(0));
    let created = commands::create_command(pool, "list_items", data).await?;
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::new("LIST_ITEM/DECODE", "Created item is missing an id"))?
        .to_string();

    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("id", Value::from(id)),
    ];
    let rows = gateway::select(pool, "list_items", &filters, None, Some(1), None).await?;
    rows.first()
        .map(ListItem::try_from)
        .transpose()?
        .ok_or_else(|| AppError::new("LIST_ITEM/NOT_FOUND", "Item not found after create"))
}

pub async fn set_item_completed(
    pool: &SqlitePool,
    household_id: &str,
    item_id: &str,
    completed: bool,
) -> AppResult<()> {
    let mut patch = Map::new();
    patch.insert("completed".into(), Value::from(completed as i64));
    commands::update_command(pool, "list_items", item_id, patch, Some(household_id)).await
}

/// Archive the week's shopping.
///
/// Copies every completed live item of the list into `list_history`, tagged
/// with the current week's start date, then removes those items from the
/// active list. Runs in one transaction so a failure leaves the list as it
/// was. Items whose text is blank are skipped. Returns the number archived.
pub async fn finish_week(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
) -> AppResult<u32> {
    let items = list_items(pool, household_id, list_id).await?;
    let completed: Vec<&ListItem> = items
        .iter()
        .filter(|item| item.completed && !item.text.trim().is_empty())
        .collect();
    if completed.is_empty() {
        return Ok(0);
    }

    let now = now_ms();
    let week_start = week_start_of(now);
    let archived = completed.len() as u32;

    let rows: Vec<(String, String, Option<String>)> = completed
        .iter()
        .map(|item| {
            (
                item.id.clone(),
                item.text.trim().to_string(),
                item.quantity.clone(),
            )
        })
        .collect();
    let household = household_id.to_string();
    let list = list_id.to_string();

    run_in_tx::<_, AppError, _>(pool, move |tx| {
        async move {
            for (item_id, text, quantity) in &rows {
                sqlx::query(
                    "INSERT INTO list_history \
                     (id, household_id, list_id, text, quantity, week_start, completed_at, \
                      created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(new_uuid_v7())
                .bind(&household)
                .bind(&list)
                .bind(text)
                .bind(quantity.as_deref())
                .bind(&week_start)
                .bind(now)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(AppError::from)?;

                sqlx::query("DELETE FROM list_items WHERE id = ? AND household_id = ?")
                    .bind(item_id)
                    .bind(&household)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;
            }
            Ok(())
        }
        .boxed()
    })
    .await
    .map_err(|err: AppError| {
        err.with_context("operation", "finish_week")
            .with_context("list_id", list_id.to_string())
    })?;

    tracing::info!(
        target = "hearth",
        event = "week_archived",
        list_id = %list_id,
        archived = archived
    );
    Ok(archived)
}
