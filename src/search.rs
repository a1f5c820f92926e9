//! Ad-hoc search across grocery items, notes, events, and tasks.
//!
//! Four independent substring lookups, each capped, merged in a fixed
//! collection order so output is deterministic. A sub-fetch that fails
//! contributes nothing instead of aborting the whole search, and a
//! ticket scheme keeps superseded searches from clobbering newer ones.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;

use crate::{
    gateway::{self, Filter},
    state::AppState,
    time::to_date,
    AppError, AppResult,
};

/// Queries shorter than this (after trim) are not issued at all.
pub const MIN_TERM_LEN: usize = 2;
const PER_KIND_LIMIT: i64 = 5;
const NOTE_TITLE_MAX: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum SearchKind {
    GroceryItem,
    Note,
    Event,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SearchResult {
    pub kind: SearchKind,
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub preview: Option<String>,
    /// Tasks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub priority: Option<String>,
}

fn format_day(ms: i64) -> String {
    to_date(ms).format("%b %-d, %Y").to_string()
}

fn format_moment(ms: i64) -> String {
    to_date(ms).format("%b %-d, %Y %H:%M").to_string()
}

/// Note previews show the content as a title, clipped to a readable width.
fn note_title(content: &str) -> String {
    if content.chars().count() > NOTE_TITLE_MAX {
        let clipped: String = content.chars().take(NOTE_TITLE_MAX).collect();
        format!("{clipped}…")
    } else {
        content.to_string()
    }
}

fn scoped_match(household_id: &str, column: &'static str, term: &str) -> [Filter; 3] {
    [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("deleted_at", Value::Null),
        Filter::Contains(column, term.to_string()),
    ]
}

async fn fetch(
    pool: &SqlitePool,
    collection: &str,
    filters: &[Filter],
) -> AppResult<Vec<SqliteRow>> {
    gateway::select(
        pool,
        collection,
        filters,
        Some("created_at, id"),
        Some(PER_KIND_LIMIT),
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "search")
            .with_context("collection", collection.to_string())
    })
}

async fn match_grocery(
    pool: &SqlitePool,
    household_id: &str,
    term: &str,
) -> AppResult<Vec<SearchResult>> {
    let filters = scoped_match(household_id, "text", term);
    let rows = fetch(pool, "list_items", &filters).await?;
    rows.iter()
        .map(|row| {
            let quantity: Option<String> = row.try_get("quantity").map_err(AppError::from)?;
            Ok(SearchResult {
                kind: SearchKind::GroceryItem,
                id: row.try_get("id").map_err(AppError::from)?,
                title: row.try_get("text").map_err(AppError::from)?,
                preview: quantity.filter(|q| !q.is_empty()),
                priority: None,
            })
        })
        .collect()
}

async fn match_notes(
    pool: &SqlitePool,
    household_id: &str,
    term: &str,
) -> AppResult<Vec<SearchResult>> {
    let filters = scoped_match(household_id, "content", term);
    let rows = fetch(pool, "notes", &filters).await?;
    rows.iter()
        .map(|row| {
            let content: String = row.try_get("content").map_err(AppError::from)?;
            let created_at: i64 = row.try_get("created_at").map_err(AppError::from)?;
            Ok(SearchResult {
                kind: SearchKind::Note,
                id: row.try_get("id").map_err(AppError::from)?,
                title: note_title(&content),
                preview: Some(format_day(created_at)),
                priority: None,
            })
        })
        .collect()
}

async fn match_events(
    pool: &SqlitePool,
    household_id: &str,
    term: &str,
) -> AppResult<Vec<SearchResult>> {
    let filters = scoped_match(household_id, "title", term);
    let rows = fetch(pool, "events", &filters).await?;
    rows.iter()
        .map(|row| {
            let starts_at: i64 = row.try_get("starts_at").map_err(AppError::from)?;
            let all_day: i64 = row.try_get("all_day").map_err(AppError::from)?;
            let preview = if all_day != 0 {
                format_day(starts_at)
            } else {
                format_moment(starts_at)
            };
            Ok(SearchResult {
                kind: SearchKind::Event,
                id: row.try_get("id").map_err(AppError::from)?,
                title: row.try_get("title").map_err(AppError::from)?,
                preview: Some(preview),
                priority: None,
            })
        })
        .collect()
}

async fn match_tasks(
    pool: &SqlitePool,
    household_id: &str,
    term: &str,
) -> AppResult<Vec<SearchResult>> {
    let filters = scoped_match(household_id, "title", term);
    let rows = fetch(pool, "tasks", &filters).await?;
    rows.iter()
        .map(|row| {
            let due_at: Option<i64> = row.try_get("due_at").map_err(AppError::from)?;
            let preview = due_at
                .map(format_day)
                .unwrap_or_else(|| "No due date".to_string());
            Ok(SearchResult {
                kind: SearchKind::Task,
                id: row.try_get("id").map_err(AppError::from)?,
                title: row.try_get("title").map_err(AppError::from)?,
                preview: Some(preview),
                priority: row.try_get("priority").map_err(AppError::from)?,
            })
        })
        .collect()
}

fn or_empty(kind: &'static str, result: AppResult<Vec<SearchResult>>) -> Vec<SearchResult> {
    match result {
        Ok(results) => results,
        Err(err) => {
            tracing::warn!(
                target = "hearth",
                event = "search_partial_failure",
                kind = %kind,
                error = %err
            );
            Vec::new()
        }
    }
}

/// Search all four collections and merge in fixed order:
/// grocery items, notes, events, tasks.
pub async fn search(
    pool: &SqlitePool,
    household_id: &str,
    term: &str,
) -> AppResult<Vec<SearchResult>> {
    let term = term.trim();
    if term.chars().count() < MIN_TERM_LEN {
        return Ok(Vec::new());
    }

    let (grocery, notes, events, tasks) = futures::join!(
        match_grocery(pool, household_id, term),
        match_notes(pool, household_id, term),
        match_events(pool, household_id, term),
        match_tasks(pool, household_id, term),
    );

    let mut out = Vec::new();
    out.extend(or_empty("grocery-item", grocery));
    out.extend(or_empty("note", notes));
    out.extend(or_empty("event", events));
    out.extend(or_empty("task", tasks));
    Ok(out)
}

/// Last-write-wins bookkeeping for in-flight searches.
///
/// Each keystroke begins a new ticket; a search that finishes after its
/// ticket has been superseded reports `None` instead of stale results.
pub struct SearchCoordinator {
    latest: AtomicU64,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
        }
    }

    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

impl Default for SearchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatch-layer search: `None` means a newer search superseded this one.
pub async fn search_command(
    state: &AppState,
    household_id: &str,
    term: &str,
) -> AppResult<Option<Vec<SearchResult>>> {
    let ticket = state.search.begin();
    let pool = state.pool_clone();
    let results = search(&pool, household_id, term).await?;
    if state.search.is_current(ticket) {
        Ok(Some(results))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_titles_clip_to_fifty_chars() {
        let short = "Buy stamps";
        assert_eq!(note_title(short), short);

        let long = "a".repeat(80);
        let clipped = note_title(&long);
        assert_eq!(clipped.chars().count(), NOTE_TITLE_MAX + 1);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn tickets_supersede_older_searches() {
        let coordinator = SearchCoordinator::new();
        let first = coordinator.begin();
        let second = coordinator.begin();
        assert!(!coordinator.is_current(first));
        assert!(coordinator.is_current(second));
    }
}
