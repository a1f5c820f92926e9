//! Hearth: the data and coordination core of a household app.
//!
//! Shared grocery lists, notes, a calendar, and tasks, scoped to a household
//! of linked accounts. Every state transition is a gateway call against the
//! relational store; the interesting read models are the purchase-history
//! aggregation and the cross-collection search.

use paste::paste;
use serde_json::{Map, Value};

pub mod commands;
pub mod db;
mod error;
pub mod events;
pub mod gateway;
pub mod history;
pub mod household;
mod id;
pub mod lists;
pub mod logging;
pub mod migrate;
pub mod notes;
pub mod search;
pub mod state;
pub mod tasks;
pub mod time;
pub mod util;

pub use error::{AppError, AppResult};
pub use events::{events_list_range, Event};
pub use history::{
    frequent_items, frequent_items_command, latest_week_command, latest_week_items, list_history,
    HistoryEntry, WeekItem, FREQUENT_LIMIT, FREQUENT_MIN_COUNT,
};
pub use household::{
    add_member, create_household, create_profile, default_household_id, delete_household,
    get_household, list_households, list_members, remove_member, restore_household,
    update_household, Household, HouseholdCrudError, Member, MemberError, Profile,
};
pub use lists::{
    add_item, create_list, finish_week, get_list, list_items, set_item_completed, List, ListItem,
};
pub use logging::init_logging;
pub use notes::{list_notes, Note};
pub use search::{
    search, search_command, SearchCoordinator, SearchKind, SearchResult, MIN_TERM_LEN,
};
pub use state::{AppState, Revisions};
pub use tasks::{
    create_task, list_tasks, list_tasks_due_between, list_tasks_with_priority, set_task_completed,
    Task, TASK_PRIORITIES,
};

use util::dispatch_async_app_result;

/// Dispatch-layer CRUD for every mutable collection.
///
/// Reads pass straight through; mutations also bump the collection's
/// revision counter so cached readers know to re-fetch. Everything runs
/// behind the panic fence: a failure is scoped to the one action that
/// triggered it.
macro_rules! gen_collection_cmds {
    ( $( $collection:ident ),+ $(,)? ) => {
        paste! {
            $(
                pub async fn [<$collection _list>](
                    state: &AppState,
                    household_id: &str,
                    order_by: Option<&str>,
                    limit: Option<i64>,
                    offset: Option<i64>,
                ) -> AppResult<Vec<Value>> {
                    let pool = state.pool_clone();
                    dispatch_async_app_result(move || async move {
                        commands::list_command(
                            &pool,
                            stringify!($collection),
                            household_id,
                            order_by,
                            limit,
                            offset,
                        ).await
                    }).await
                }

                pub async fn [<$collection _get>](
                    state: &AppState,
                    household_id: Option<&str>,
                    id: &str,
                ) -> AppResult<Option<Value>> {
                    let pool = state.pool_clone();
                    dispatch_async_app_result(move || async move {
                        commands::get_command(
                            &pool,
                            stringify!($collection),
                            household_id,
                            id,
                        ).await
                    }).await
                }

                pub async fn [<$collection _create>](
                    state: &AppState,
                    data: Map<String, Value>,
                ) -> AppResult<Value> {
                    let pool = state.pool_clone();
                    let created = dispatch_async_app_result(move || async move {
                        commands::create_command(
                            &pool,
                            stringify!($collection),
                            data,
                        ).await
                    }).await?;
                    state.revisions.bump(stringify!($collection));
                    Ok(created)
                }

                pub async fn [<$collection _update>](
                    state: &AppState,
                    id: &str,
                    data: Map<String, Value>,
                    household_id: Option<&str>,
                ) -> AppResult<()> {
                    let pool = state.pool_clone();
                    dispatch_async_app_result(move || async move {
                        commands::update_command(
                            &pool,
                            stringify!($collection),
                            id,
                            data,
                            household_id,
                        ).await
                    }).await?;
                    state.revisions.bump(stringify!($collection));
                    Ok(())
                }

                pub async fn [<$collection _delete>](
                    state: &AppState,
                    household_id: &str,
                    id: &str,
                ) -> AppResult<()> {
                    let pool = state.pool_clone();
                    dispatch_async_app_result(move || async move {
                        commands::delete_command(
                            &pool,
                            stringify!($collection),
                            household_id,
                            id,
                        ).await
                    }).await?;
                    state.revisions.bump(stringify!($collection));
                    Ok(())
                }

                pub async fn [<$collection _restore>](
                    state: &AppState,
                    household_id: &str,
                    id: &str,
                ) -> AppResult<()> {
                    let pool = state.pool_clone();
                    dispatch_async_app_result(move || async move {
                        commands::restore_command(
                            &pool,
                            stringify!($collection),
                            household_id,
                            id,
                        ).await
                    }).await?;
                    state.revisions.bump(stringify!($collection));
                    Ok(())
                }
            )+
        }
    };
}

gen_collection_cmds!(
    household,
    profiles,
    household_members,
    lists,
    list_items,
    notes,
    events,
    tasks,
);

/// Append an archived entry. History is append-only: there is no update,
/// delete, or restore counterpart for this collection.
pub async fn list_history_insert(
    state: &AppState,
    data: Map<String, Value>,
) -> AppResult<Value> {
    let pool = state.pool_clone();
    let created = dispatch_async_app_result(move || async move {
        commands::create_command(&pool, "list_history", data).await
    })
    .await?;
    state.revisions.bump("list_history");
    Ok(created)
}
