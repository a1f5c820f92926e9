use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    pub id: String,
    pub household_id: String,
    pub title: String,
    #[ts(type = "number")]
    pub starts_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub ends_at: Option<i64>,
    pub all_day: bool,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for Event {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            household_id: row.try_get("household_id").map_err(AppError::from)?,
            title: row.try_get("title").map_err(AppError::from)?,
            starts_at: row.try_get("starts_at").map_err(AppError::from)?,
            ends_at: row
                .try_get::<Option<i64>, _>("ends_at")
                .map_err(AppError::from)?,
            all_day: row.try_get::<i64, _>("all_day").map_err(AppError::from)? != 0,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
            deleted_at: row
                .try_get::<Option<i64>, _>("deleted_at")
                .map_err(AppError::from)?,
        })
    }
}

/// Live events overlapping `[start, end]`, ordered by start then id.
///
/// An event with no end is treated as instantaneous at `starts_at`.
pub async fn events_list_range(
    pool: &SqlitePool,
    household_id: &str,
    start: i64,
    end: i64,
) -> AppResult<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT * FROM events \
         WHERE household_id = ? AND deleted_at IS NULL \
           AND COALESCE(ends_at, starts_at) >= ? AND starts_at <= ? \
         ORDER BY starts_at, id",
    )
    .bind(household_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "events_list_range")
            .with_context("household_id", household_id.to_string())
            .with_context("start", start.to_string())
            .with_context("end", end.to_string())
    })?;
    rows.iter().map(Event::try_from).collect()
}
