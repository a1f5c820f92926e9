//! Uniform query surface over the relational store.
//!
//! Every domain read and write funnels through four operations: `select`,
//! `insert`, `update`, and `delete`, each scoped to a named collection and a
//! set of filters. Collection and column names are validated against closed
//! lists before any SQL is formatted, so the string-built statements below
//! never interpolate caller data.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::{AppError, AppResult};

/// Collections the gateway will touch. Anything else is rejected up front.
pub const COLLECTIONS: &[&str] = &[
    "household",
    "profiles",
    "household_members",
    "lists",
    "list_items",
    "list_history",
    "notes",
    "events",
    "tasks",
];

/// Collections whose rows are immutable once written.
const APPEND_ONLY: &[&str] = &["list_history"];

/// Collections that are not scoped by `household_id`.
pub const UNSCOPED: &[&str] = &["household", "profiles"];

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier pattern to compile"));

static ORDER_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*( +(?i:asc|desc))?$").expect("order term pattern to compile")
});

pub fn ensure_collection(name: &str) -> AppResult<()> {
    if COLLECTIONS.contains(&name) {
        Ok(())
    } else {
        Err(AppError::new("GATEWAY/INVALID_COLLECTION", "Unknown collection")
            .with_context("collection", name.to_string()))
    }
}

pub fn ensure_mutable(name: &str) -> AppResult<()> {
    ensure_collection(name)?;
    if APPEND_ONLY.contains(&name) {
        Err(AppError::new(
            "GATEWAY/IMMUTABLE_COLLECTION",
            "Collection is append-only",
        )
        .with_context("collection", name.to_string()))
    } else {
        Ok(())
    }
}

fn ensure_column(name: &str) -> AppResult<()> {
    if IDENT.is_match(name) {
        Ok(())
    } else {
        Err(AppError::new("GATEWAY/INVALID_COLUMN", "Invalid column name")
            .with_context("column", name.to_string()))
    }
}

fn ensure_order_by(order_by: &str) -> AppResult<()> {
    let ok = order_by
        .split(',')
        .map(str::trim)
        .all(|term| ORDER_TERM.is_match(term));
    if ok {
        Ok(())
    } else {
        Err(AppError::new("GATEWAY/INVALID_ORDER", "Invalid ordering clause")
            .with_context("order_by", order_by.to_string()))
    }
}

/// A single predicate on a collection column.
///
/// `Eq`/`Ne` against `Value::Null` compile to `IS NULL` / `IS NOT NULL`.
/// `Contains` is a case-insensitive substring match with `%`/`_` escaped.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, Value),
    Ne(&'static str, Value),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
    Contains(&'static str, String),
    In(&'static str, Vec<Value>),
}

impl Filter {
    fn column(&self) -> &'static str {
        match self {
            Filter::Eq(c, _)
            | Filter::Ne(c, _)
            | Filter::Gte(c, _)
            | Filter::Lte(c, _)
            | Filter::Contains(c, _)
            | Filter::In(c, _) => c,
        }
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Pattern for a case-insensitive substring match against `LOWER(column)`.
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(&term.to_lowercase()))
}

fn where_clause(filters: &[Filter]) -> AppResult<String> {
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        ensure_column(filter.column())?;
        let part = match filter {
            Filter::Eq(col, Value::Null) => format!("{col} IS NULL"),
            Filter::Ne(col, Value::Null) => format!("{col} IS NOT NULL"),
            Filter::Eq(col, _) => format!("{col} = ?"),
            Filter::Ne(col, _) => format!("{col} != ?"),
            Filter::Gte(col, _) => format!("{col} >= ?"),
            Filter::Lte(col, _) => format!("{col} <= ?"),
            Filter::Contains(col, _) => format!("LOWER({col}) LIKE ? ESCAPE '\\'"),
            Filter::In(_, values) if values.is_empty() => "0 = 1".to_string(),
            Filter::In(col, values) => {
                let marks = vec!["?"; values.len()].join(", ");
                format!("{col} IN ({marks})")
            }
        };
        parts.push(part);
    }
    if parts.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(q: SqliteQuery<'q>, v: &Value) -> SqliteQuery<'q> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

fn bind_filters<'q>(mut q: SqliteQuery<'q>, filters: &'q [Filter]) -> SqliteQuery<'q> {
    for filter in filters {
        match filter {
            Filter::Eq(_, Value::Null) | Filter::Ne(_, Value::Null) => {}
            Filter::Eq(_, v) | Filter::Ne(_, v) | Filter::Gte(_, v) | Filter::Lte(_, v) => {
                q = bind_value(q, v);
            }
            Filter::Contains(_, pattern) => {
                q = q.bind(contains_pattern(pattern));
            }
            Filter::In(_, values) => {
                for v in values {
                    q = bind_value(q, v);
                }
            }
        }
    }
    q
}

pub async fn select(
    pool: &SqlitePool,
    collection: &str,
    filters: &[Filter],
    order_by: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<SqliteRow>> {
    ensure_collection(collection)?;
    let mut sql = format!("SELECT * FROM {collection}{}", where_clause(filters)?);
    if let Some(order_by) = order_by {
        ensure_order_by(order_by)?;
        sql.push_str(&format!(" ORDER BY {order_by}"));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {}", offset.max(0)));
        }
    }
    let query = bind_filters(sqlx::query(&sql), filters);
    query.fetch_all(pool).await.map_err(AppError::from)
}

pub async fn insert(
    pool: &SqlitePool,
    collection: &str,
    data: &Map<String, Value>,
) -> AppResult<()> {
    ensure_collection(collection)?;
    let cols: Vec<&String> = data.keys().collect();
    for col in &cols {
        ensure_column(col)?;
    }
    let marks = vec!["?"; cols.len()].join(",");
    let names = cols
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!("INSERT INTO {collection} ({names}) VALUES ({marks})");
    let mut query = sqlx::query(&sql);
    for col in &cols {
        let value = data.get(*col).ok_or_else(|| {
            AppError::new("GATEWAY/MISSING_FIELD", "Payload missing value for column")
                .with_context("column", (*col).clone())
        })?;
        query = bind_value(query, value);
    }
    query.execute(pool).await.map_err(AppError::from)?;
    Ok(())
}

pub async fn update(
    pool: &SqlitePool,
    collection: &str,
    patch: &Map<String, Value>,
    filters: &[Filter],
) -> AppResult<u64> {
    ensure_collection(collection)?;
    if patch.is_empty() {
        return Ok(0);
    }
    let cols: Vec<&String> = patch.keys().collect();
    for col in &cols {
        ensure_column(col)?;
    }
    let set_clause = cols
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "UPDATE {collection} SET {set_clause}{}",
        where_clause(filters)?
    );
    let mut query = sqlx::query(&sql);
    for col in &cols {
        let value = patch.get(*col).ok_or_else(|| {
            AppError::new("GATEWAY/MISSING_FIELD", "Payload missing value for column")
                .with_context("column", (*col).clone())
        })?;
        query = bind_value(query, value);
    }
    let query = bind_filters(query, filters);
    let res = query.execute(pool).await.map_err(AppError::from)?;
    Ok(res.rows_affected())
}

pub async fn delete(
    pool: &SqlitePool,
    collection: &str,
    filters: &[Filter],
) -> AppResult<u64> {
    ensure_collection(collection)?;
    if filters.is_empty() {
        // An unfiltered DELETE is never what a caller means.
        return Err(AppError::new(
            "GATEWAY/UNFILTERED_DELETE",
            "Refusing to delete an entire collection",
        )
        .with_context("collection", collection.to_string()));
    }
    let sql = format!("DELETE FROM {collection}{}", where_clause(filters)?);
    let query = bind_filters(sqlx::query(&sql), filters);
    let res = query.execute(pool).await.map_err(AppError::from)?;
    Ok(res.rows_affected())
}

/// Decode a row into a JSON object keyed by column name.
pub fn row_to_json(row: SqliteRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    Value::Object(map)
}
