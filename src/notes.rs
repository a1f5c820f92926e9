use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::{
    gateway::{self, Filter},
    AppError, AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Note {
    pub id: String,
    pub household_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub color: Option<String>,
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

impl TryFrom<&SqliteRow> for Note {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            household_id: row.try_get("household_id").map_err(AppError::from)?,
            content: row.try_get("content").map_err(AppError::from)?,
            color: row
                .try_get::<Option<String>, _>("color")
                .map_err(AppError::from)?,
            position: row.try_get("position").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
            deleted_at: row
                .try_get::<Option<i64>, _>("deleted_at")
                .map_err(AppError::from)?,
        })
    }
}

/// Live notes in board order.
pub async fn list_notes(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Note>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
    ];
    let rows = gateway::select(
        pool,
        "notes",
        &filters,
        Some("position, created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list")
            .with_context("collection", "notes".to_string())
            .with_context("household_id", household_id.to_string())
    })?;
    rows.iter().map(Note::try_from).collect()
}
