//! Purchase-history aggregation for grocery lists.
//!
//! Archived weeks feed two read models: the most recent week's snapshot and
//! an all-time frequency ranking used to suggest quick re-adds. Both are
//! pure over the fetched history, so they stay trivially testable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use ts_rs::TS;
use unicode_normalization::UnicodeNormalization;

use crate::{
    gateway::{self, Filter},
    AppError, AppResult,
};

pub const FREQUENT_MIN_COUNT: usize = 2;
pub const FREQUENT_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryEntry {
    pub id: String,
    pub household_id: String,
    pub list_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub quantity: Option<String>,
    /// ISO `YYYY-MM-DD`; the Sunday the shopping week began.
    pub week_start: String,
    #[ts(type = "number")]
    pub completed_at: i64,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl TryFrom<&SqliteRow> for HistoryEntry {
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
            week_start: row.try_get("week_start").map_err(AppError::from)?,
            completed_at: row.try_get("completed_at").map_err(AppError::from)?,
            created_at: row.try_get("created_at").map_err(AppError::from)?,
            updated_at: row.try_get("updated_at").map_err(AppError::from)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WeekItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub quantity: Option<String>,
}

/// Grouping key: entries that differ only in surrounding whitespace,
/// Unicode normalization form, or letter case are the same item.
fn normalized_key(text: &str) -> String {
    text.trim().nfc().collect::<String>().to_lowercase()
}

/// Items archived in the most recent week, deduplicated.
///
/// The first occurrence (in insertion order) wins both the displayed casing
/// (trimmed, like the frequency ranking's) and the quantity. No entries
/// means no week, means an empty snapshot.
pub fn latest_week_items(history: &[HistoryEntry]) -> Vec<WeekItem> {
    let Some(latest) = history.iter().map(|e| e.week_start.as_str()).max() else {
        return Vec::new();
    };
    let latest = latest.to_string();

    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for entry in history.iter().filter(|e| e.week_start == latest) {
        let key = normalized_key(&entry.text);
        if seen.iter().any(|k| *k == key) {
            continue;
        }
        seen.push(key);
        out.push(WeekItem {
            text: entry.text.trim().to_string(),
            quantity: entry.quantity.clone(),
        });
    }
    out
}

/// All-time frequency ranking across every archived week.
///
/// Groups case-insensitively, drops groups under `min_count`, sorts by count
/// descending and truncates to `limit`. The sort is stable, so equal counts
/// keep first-appearance order and the output is deterministic.
pub fn frequent_items(history: &[HistoryEntry], min_count: usize, limit: usize) -> Vec<String> {
    // (key, display text, count) in first-appearance order
    let mut groups: Vec<(String, String, usize)> = Vec::new();
    for entry in history {
        let key = normalized_key(&entry.text);
        if key.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, count)) => *count += 1,
            None => groups.push((key, entry.text.trim().to_string(), 1)),
        }
    }

    groups.retain(|(_, _, count)| *count >= min_count);
    groups.sort_by(|a, b| b.2.cmp(&a.2));
    groups.truncate(limit);
    groups.into_iter().map(|(_, display, _)| display).collect()
}

/// Full archived history of one list, in insertion order.
pub async fn list_history(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
) -> AppResult<Vec<HistoryEntry>> {
    let filters = [
        Filter::Eq("household_id", Value::from(household_id.to_string())),
        Filter::Eq("list_id", Value::from(list_id.to_string())),
    ];
    let rows = gateway::select(
        pool,
        "list_history",
        &filters,
        Some("created_at, id"),
        None,
        None,
    )
    .await
    .map_err(|err| {
        err.with_context("operation", "list")
            .with_context("collection", "list_history".to_string())
            .with_context("list_id", list_id.to_string())
    })?;
    rows.iter().map(HistoryEntry::try_from).collect()
}

/// Fetch-and-aggregate: the latest archived week of a list.
pub async fn latest_week_command(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
) -> AppResult<Vec<WeekItem>> {
    let history = list_history(pool, household_id, list_id).await?;
    Ok(latest_week_items(&history))
}

/// Fetch-and-aggregate: frequent-item suggestions for a list.
pub async fn frequent_items_command(
    pool: &SqlitePool,
    household_id: &str,
    list_id: &str,
) -> AppResult<Vec<String>> {
    let history = list_history(pool, household_id, list_id).await?;
    Ok(frequent_items(&history, FREQUENT_MIN_COUNT, FREQUENT_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, quantity: Option<&str>, week_start: &str) -> HistoryEntry {
        HistoryEntry {
            id: String::new(),
            household_id: "h1".into(),
            list_id: "l1".into(),
            text: text.into(),
            quantity: quantity.map(str::to_string),
            week_start: week_start.into(),
            completed_at: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn latest_week_keeps_newest_week_and_dedups_case_insensitively() {
        let history = vec![
            entry("Milk", None, "2024-01-07"),
            entry("milk", None, "2024-01-07"),
            entry("Eggs", None, "2023-12-31"),
        ];
        let items = latest_week_items(&history);
        assert_eq!(
            items,
            vec![WeekItem {
                text: "Milk".into(),
                quantity: None
            }]
        );
    }

    #[test]
    fn latest_week_first_occurrence_wins_quantity() {
        let history = vec![
            entry("Bread", Some("1 loaf"), "2024-01-14"),
            entry(" bread ", Some("2 loaves"), "2024-01-14"),
        ];
        let items = latest_week_items(&history);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Bread");
        assert_eq!(items[0].quantity.as_deref(), Some("1 loaf"));
    }

    #[test]
    fn latest_week_of_empty_history_is_empty() {
        assert!(latest_week_items(&[]).is_empty());
    }

    #[test]
    fn latest_week_trims_surrounding_whitespace() {
        let history = vec![entry("  Juice ", Some("1L"), "2024-01-07")];
        let items = latest_week_items(&history);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Juice");
        assert_eq!(items[0].quantity.as_deref(), Some("1L"));
    }

    #[test]
    fn frequent_ranks_by_count_and_merges_casing() {
        let history = vec![
            entry("milk", None, "2023-12-24"),
            entry("Bread", None, "2023-12-24"),
            entry("Bread", None, "2023-12-31"),
            entry("Milk", None, "2023-12-31"),
            entry("Eggs", None, "2023-12-31"),
            entry("Bread", None, "2024-01-07"),
        ];
        let ranked = frequent_items(&history, 2, 8);
        // Bread 3, milk 2 (first seen lowercase), Eggs once and excluded.
        assert_eq!(ranked, vec!["Bread".to_string(), "milk".to_string()]);
    }

    #[test]
    fn frequent_ties_keep_first_appearance_order() {
        let history = vec![
            entry("Apples", None, "2024-01-07"),
            entry("Pears", None, "2024-01-07"),
            entry("Apples", None, "2024-01-14"),
            entry("Pears", None, "2024-01-14"),
        ];
        let ranked = frequent_items(&history, 2, 8);
        assert_eq!(ranked, vec!["Apples".to_string(), "Pears".to_string()]);
    }

    #[test]
    fn frequent_respects_min_count_and_limit() {
        assert!(frequent_items(&[], 2, 8).is_empty());

        let singles = vec![
            entry("One", None, "2024-01-07"),
            entry("Two", None, "2024-01-07"),
        ];
        assert!(frequent_items(&singles, 2, 8).is_empty());

        let mut many = Vec::new();
        for i in 0..10 {
            let name = format!("Item{i}");
            many.push(entry(&name, None, "2024-01-07"));
            many.push(entry(&name, None, "2024-01-14"));
        }
        assert_eq!(frequent_items(&many, 2, 8).len(), 8);
    }

    #[test]
    fn whitespace_only_variants_share_a_group() {
        let history = vec![
            entry("Olive oil", None, "2024-01-07"),
            entry("  olive oil", None, "2024-01-14"),
        ];
        let ranked = frequent_items(&history, 2, 8);
        assert_eq!(ranked, vec!["Olive oil".to_string()]);
    }

    #[test]
    fn aggregation_is_pure() {
        let history = vec![
            entry("Milk", None, "2024-01-07"),
            entry("milk", None, "2024-01-07"),
        ];
        let first = latest_week_items(&history);
        let second = latest_week_items(&history);
        assert_eq!(first, second);
    }
}
