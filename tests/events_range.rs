use anyhow::Result;
use serde_json::Value;

use hearth_lib::{default_household_id, events::events_list_range, events_create, AppState};

#[path = "util.rs"]
mod util;

const HOUR: i64 = 3_600_000;
// 2024-01-07T00:00:00Z
const DAY_MS: i64 = 1_704_585_600_000;

async fn seed_event(
    state: &AppState,
    household_id: &str,
    title: &str,
    starts_at: i64,
    ends_at: Option<i64>,
) -> Result<()> {
    events_create(
        state,
        util::object(&[
            ("household_id", Value::from(household_id.to_string())),
            ("title", Value::from(title.to_string())),
            ("starts_at", Value::from(starts_at)),
            (
                "ends_at",
                ends_at.map(Value::from).unwrap_or(Value::Null),
            ),
            ("all_day", Value::from(0)),
        ]),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn range_listing_returns_overlapping_events_in_order() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;
    let state = AppState::new(pool.clone());

    seed_event(&state, &household_id, "Before", DAY_MS - 2 * HOUR, Some(DAY_MS - HOUR)).await?;
    seed_event(&state, &household_id, "Spans start", DAY_MS - HOUR, Some(DAY_MS + HOUR)).await?;
    seed_event(&state, &household_id, "Inside", DAY_MS + 2 * HOUR, Some(DAY_MS + 3 * HOUR)).await?;
    seed_event(&state, &household_id, "Point", DAY_MS + 4 * HOUR, None).await?;
    seed_event(&state, &household_id, "After", DAY_MS + 30 * HOUR, None).await?;

    let events = events_list_range(&pool, &household_id, DAY_MS, DAY_MS + 24 * HOUR).await?;
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Spans start", "Inside", "Point"]);
    Ok(())
}

#[tokio::test]
async fn range_listing_is_scoped_to_the_household() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;
    let other = hearth_lib::create_household(&pool, "Neighbours").await?;
    let state = AppState::new(pool.clone());

    seed_event(&state, &household_id, "Ours", DAY_MS, None).await?;
    seed_event(&state, &other.id, "Theirs", DAY_MS, None).await?;

    let events = events_list_range(&pool, &household_id, DAY_MS - HOUR, DAY_MS + HOUR).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Ours");
    Ok(())
}
