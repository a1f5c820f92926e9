use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use thiserror::Error;
use ts_rs::TS;

use crate::db::run_in_tx;
use crate::id::new_uuid_v7;
use crate::time::now_ms;

// Good enough for a precondition check; real validation is the mail server's
// problem.
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern to compile"));

#[derive(Debug, Error)]
pub enum HouseholdCrudError {
    #[error("household not found")]
    NotFound,
    #[error("the default household cannot be deleted")]
    DefaultUndeletable,
    #[error("household is deleted")]
    Deleted,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("display name must not be empty")]
    InvalidDisplayName,
    #[error("email address does not look valid")]
    InvalidEmail,
    #[error("profile is already a member of this household")]
    DuplicateMember,
    #[error("household not found or deleted")]
    HouseholdUnavailable,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("member not found")]
    MemberNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Household {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for Household {
    type Error = sqlx::Error;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            is_default: row.try_get::<i64, _>("is_default")? != 0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub deleted_at: Option<i64>,
}

impl TryFrom<&SqliteRow> for Profile {
    type Error = sqlx::Error;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?,
        })
    }
}

/// A household membership joined with the profile it links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Member {
    pub id: String,
    pub household_id: String,
    pub profile_id: String,
    pub role: String,
    pub display_name: String,
    pub email: String,
    #[ts(type = "number")]
    pub created_at: i64,
}

impl TryFrom<&SqliteRow> for Member {
    type Error = sqlx::Error;

    fn try_from(row: &SqliteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            household_id: row.try_get("household_id")?,
            profile_id: row.try_get("profile_id")?,
            role: row.try_get("role")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Id of the default household, creating it on first run.
pub async fn default_household_id(pool: &SqlitePool) -> anyhow::Result<String> {
    let existing = sqlx::query(
        "SELECT id FROM household WHERE is_default = 1 AND deleted_at IS NULL LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    if let Some(row) = existing {
        let id: String = row.try_get("id")?;
        return Ok(id);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    run_in_tx(pool, |tx| {
        let id = id.clone();
        async move {
            sqlx::query(
                "INSERT INTO household (id, name, is_default, created_at, updated_at) \
                 VALUES (?, ?, 1, ?, ?)",
            )
            .bind(&id)
            .bind("Home")
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            Ok::<_, sqlx::Error>(())
        }
        .boxed()
    })
    .await?;
    tracing::info!(target = "hearth", event = "default_household_created", id = %id);
    Ok(id)
}

pub async fn create_household(
    pool: &SqlitePool,
    name: &str,
) -> Result<Household, HouseholdCrudError> {
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household (id, name, is_default, created_at, updated_at) \
         VALUES (?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    get_household(pool, &id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)
}

pub async fn get_household(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Household>, HouseholdCrudError> {
    let row = sqlx::query("SELECT * FROM household WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(Household::try_from).transpose().map_err(Into::into)
}

pub async fn list_households(
    pool: &SqlitePool,
    include_deleted: bool,
) -> Result<Vec<Household>, HouseholdCrudError> {
    let sql = if include_deleted {
        "SELECT * FROM household ORDER BY created_at, id"
    } else {
        "SELECT * FROM household WHERE deleted_at IS NULL ORDER BY created_at, id"
    };
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter()
        .map(Household::try_from)
        .collect::<Result<_, _>>()
        .map_err(Into::into)
}

pub async fn update_household(
    pool: &SqlitePool,
    id: &str,
    name: &str,
) -> Result<Household, HouseholdCrudError> {
    let current = get_household(pool, id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)?;
    if current.deleted_at.is_some() {
        return Err(HouseholdCrudError::Deleted);
    }
    sqlx::query("UPDATE household SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(now_ms())
        .bind(id)
        .execute(pool)
        .await?;
    get_household(pool, id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)
}

/// Soft-delete a household. The default household is protected.
pub async fn delete_household(pool: &SqlitePool, id: &str) -> Result<(), HouseholdCrudError> {
    let current = get_household(pool, id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)?;
    if current.is_default {
        return Err(HouseholdCrudError::DefaultUndeletable);
    }
    if current.deleted_at.is_some() {
        return Err(HouseholdCrudError::Deleted);
    }
    let now = now_ms();
    sqlx::query("UPDATE household SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    tracing::info!(target = "hearth", event = "household_deleted", id = %id);
    Ok(())
}

pub async fn restore_household(
    pool: &SqlitePool,
    id: &str,
) -> Result<Household, HouseholdCrudError> {
    let current = get_household(pool, id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)?;
    if current.deleted_at.is_some() {
        sqlx::query("UPDATE household SET deleted_at = NULL, updated_at = ? WHERE id = ?")
            .bind(now_ms())
            .bind(id)
            .execute(pool)
            .await?;
    }
    get_household(pool, id)
        .await?
        .ok_or(HouseholdCrudError::NotFound)
}

/// Create a profile after the local precondition checks pass. No network
/// round trip happens when validation fails.
pub async fn create_profile(
    pool: &SqlitePool,
    display_name: &str,
    email: &str,
) -> Result<Profile, MemberError> {
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(MemberError::InvalidDisplayName);
    }
    let email = email.trim();
    if !EMAIL.is_match(email) {
        return Err(MemberError::InvalidEmail);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO profiles (id, display_name, email, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(display_name)
    .bind(email)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Profile::try_from(&row).map_err(Into::into)
}

/// Link a profile into a household. Rejects duplicates among live links.
pub async fn add_member(
    pool: &SqlitePool,
    household_id: &str,
    profile_id: &str,
    role: &str,
) -> Result<Member, MemberError> {
    let household: Option<(Option<i64>,)> =
        sqlx::query_as("SELECT deleted_at FROM household WHERE id = ?")
            .bind(household_id)
            .fetch_optional(pool)
            .await?;
    match household {
        Some((None,)) => {}
        _ => return Err(MemberError::HouseholdUnavailable),
    }

    let profile: Option<(String,)> =
        sqlx::query_as("SELECT id FROM profiles WHERE id = ? AND deleted_at IS NULL")
            .bind(profile_id)
            .fetch_optional(pool)
            .await?;
    if profile.is_none() {
        return Err(MemberError::ProfileNotFound);
    }

    let duplicate: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM household_members \
         WHERE household_id = ? AND profile_id = ? AND deleted_at IS NULL",
    )
    .bind(household_id)
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;
    if duplicate.is_some() {
        return Err(MemberError::DuplicateMember);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household_members (id, household_id, profile_id, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(profile_id)
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    list_members(pool, household_id)
        .await?
        .into_iter()
        .find(|m| m.id == id)
        .ok_or(MemberError::MemberNotFound)
}

/// Live members of a household, joined with their profiles.
pub async fn list_members(
    pool: &SqlitePool,
    household_id: &str,
) -> Result<Vec<Member>, MemberError> {
    let rows = sqlx::query(
        "SELECT m.id, m.household_id, m.profile_id, m.role, m.created_at, \
                p.display_name, p.email \
         FROM household_members m \
         JOIN profiles p ON p.id = m.profile_id \
         WHERE m.household_id = ? AND m.deleted_at IS NULL AND p.deleted_at IS NULL \
         ORDER BY m.created_at, m.id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(Member::try_from)
        .collect::<Result<_, _>>()
        .map_err(Into::into)
}

/// Unlink a member from a household (soft delete; the profile remains).
pub async fn remove_member(
    pool: &SqlitePool,
    household_id: &str,
    member_id: &str,
) -> Result<(), MemberError> {
    let now = now_ms();
    let res = sqlx::query(
        "UPDATE household_members SET deleted_at = ?, updated_at = ? \
         WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(member_id)
    .bind(household_id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(MemberError::MemberNotFound);
    }
    Ok(())
}
