use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::{
    commands,
    gateway::{self, Filter},
    AppError, AppResult,
};

pub const TASK_PRIORITIES: &[&str] = &["low", "medium", "high"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Task {
    pub id: String,
    pub household_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub due_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub priority: Option<String>,
    pub completed: bool,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for Task {
    type Error = AppError;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id").map_err(AppError::from)?,
            household_id: row.try_get("household_id").map_err(AppError::from)?,
            title: row.try_get("title").map_err(AppError::from)?,
            due_at: row
                .try_get::<Option<i64>, _>("due_at")
                .map_err(AppError::from)?,
            priority: row
                .try_get::<Option<String>, _>("priority")
                .map_err(AppError::from)?,
            completed: row.try_get::<i64, _>("completed").map_err(AppError::from)? != 0,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
            deleted_at: row
                .try_get::<Option<i64>, _>("deleted_at")
                .map_err(AppError::from)?,
        })
    }
}

/// Live tasks, open before done, then nearest due date first.
pub async fn list_tasks(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Task>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
    ];
    let rows = gateway::select(
        pool,
        "tasks",
        &filters,
        Some("completed, due_at, created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list")
            .with_context("collection", "tasks".to_string())
            .with_context("household_id", household_id.to_string())
    })?;
    rows.iter().map(Task::try_from).collect()
}

pub async fn create_task(
    pool: &SqlitePool,
    household_id: &str,
    title: &str,
    due_at: Option<i64>,
    priority: Option<&str>,
) -> AppResult<Task> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::new("TASK/EMPTY_TITLE", "Task title must not be empty"));
    }
    if let Some(priority) = priority {
        if !TASK_PRIORITIES.contains(&priority) {
            return Err(AppError::new("TASK/INVALID_PRIORITY", "Unknown task priority")
                .with_context("priority", priority.to_string()));
        }
    }

    let mut data = Map::new();
    data.insert("household_id".into(), Value::from(household_id.to_string()));
    data.insert("title".into(), Value::from(title.to_string()));
    data.insert(
        "due_at".into(),
        due_at.map(Value::from).unwrap_or(Value::Null),
    );
    data.insert(
        "priority".into(),
        priority
            .map(|p| Value::from(p.to_string()))
            .unwrap_or(Value::Null),
    );
    data.insert("completed".into(), Value::from(0));
    let created = commands::create_command(pool, "tasks", data).await?;
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::new("TASK/DECODE", "Created task is missing an id"))?
        .to_string();

    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("id", Value::from(id)),
    ];
    let rows = gateway::select(pool, "tasks", &filters, None, Some(1), None).await?;
    rows.first()
        .map(Task::try_from)
        .transpose()?
        .ok_or_else(|| AppError::new("TASK/NOT_FOUND", "Task not found after create"))
}

pub async fn set_task_completed(
    pool: &SqlitePool,
    household_id: &str,
    task_id: &str,
    completed: bool,
) -> AppResult<()> {
    let mut patch = Map::new();
    patch.insert("completed".into(), Value::from(completed as i64));
    commands::update_command(pool, "tasks", task_id, patch, Some(household_id)).await
}

/// Open tasks due inside `[start, end]`, soonest first.
pub async fn list_tasks_due_between(
    pool: &SqlitePool,
    household_id: &str,
    start: i64,
    end: i64,
) -> AppResult<Vec<Task>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
        Filter::Ne("completed", Value::from(1)),
        Filter::Gte("due_at", Value::from(start)),
        Filter::Lte("due_at", Value::from(end)),
    ];
    let rows = gateway::select(
        pool,
        "tasks",
        &filters,
        Some("due_at, created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list_due_between")
            .with_context("collection", "tasks".to_string())
            .with_context("household_id", household_id.to_string())
    })?;
    rows.iter().map(Task::try_from).collect()
}

/// Live tasks restricted to the given priorities. An empty set matches
/// nothing.
pub async fn list_tasks_with_priority(
    pool: &SqlitePool,
    household_id: &str,
    priorities: &[&str],
) -> AppResult<Vec<Task>> {
    let values = priorities
        .iter()
        .map(|p| Value::from(p.to_string()))
        .collect();
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
        Filter::In("priority", values),
    ];
    let rows = gateway::select(
        pool,
        "tasks",
        &filters,
        Some("completed, due_at, created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list_with_priority")
            .with_context("collection", "tasks".to_string())
            .with_context("household_id", household_id.to_string())
    })?;
    rows.iter().map(Task::try_from).collect()
}
