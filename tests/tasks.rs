use anyhow::Result;

use hearth_lib::{
    create_task, default_household_id, list_tasks, list_tasks_due_between,
    list_tasks_with_priority, set_task_completed,
};

#[path = "util.rs"]
mod util;

const DAY: i64 = 86_400_000;
// 2024-01-07T00:00:00Z
const WEEK_MS: i64 = 1_704_585_600_000;

#[tokio::test]
async fn create_and_complete_tasks() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;

    let task = create_task(&pool, &household_id, "Descale the kettle", None, Some("low")).await?;
    assert!(!task.completed);
    assert_eq!(task.priority.as_deref(), Some("low"));

    set_task_completed(&pool, &household_id, &task.id, true).await?;
    let tasks = list_tasks(&pool, &household_id).await?;
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].completed);
    Ok(())
}

#[tokio::test]
async fn task_preconditions_fail_fast() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;

    let err = create_task(&pool, &household_id, "  ", None, None)
        .await
        .expect_err("blank title should be rejected");
    assert_eq!(err.code(), "TASK/EMPTY_TITLE");

    let err = create_task(&pool, &household_id, "Paint fence", None, Some("urgent"))
        .await
        .expect_err("unknown priority should be rejected");
    assert_eq!(err.code(), "TASK/INVALID_PRIORITY");

    assert!(list_tasks(&pool, &household_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn due_window_excludes_completed_and_out_of_range() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;

    create_task(&pool, &household_id, "Inside", Some(WEEK_MS + DAY), None).await?;
    let done = create_task(&pool, &household_id, "Done", Some(WEEK_MS + DAY), None).await?;
    set_task_completed(&pool, &household_id, &done.id, true).await?;
    create_task(&pool, &household_id, "Next month", Some(WEEK_MS + 40 * DAY), None).await?;
    create_task(&pool, &household_id, "Undated", None, None).await?;

    let due = list_tasks_due_between(&pool, &household_id, WEEK_MS, WEEK_MS + 7 * DAY).await?;
    let titles: Vec<&str> = due.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Inside"]);
    Ok(())
}

#[tokio::test]
async fn priority_filter_uses_set_membership() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;

    create_task(&pool, &household_id, "Boiler service", None, Some("high")).await?;
    create_task(&pool, &household_id, "Weed the patio", None, Some("low")).await?;
    create_task(&pool, &household_id, "Sort recycling", None, Some("medium")).await?;

    let urgent =
        list_tasks_with_priority(&pool, &household_id, &["high", "medium"]).await?;
    assert_eq!(urgent.len(), 2);
    assert!(urgent.iter().all(|t| {
        matches!(t.priority.as_deref(), Some("high") | Some("medium"))
    }));

    assert!(list_tasks_with_priority(&pool, &household_id, &[])
        .await?
        .is_empty());
    Ok(())
}
