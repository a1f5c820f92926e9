//! Structured errors surfaced to the view layer.
//!
//! Every failed action resolves to one `AppError`: a stable machine code,
//! a message short enough for an error banner, and whatever context the
//! dispatch layer attached on the way up. Store-level failures fold into a
//! small set of `STORE/*` codes here; domain modules keep their own enums
//! and convert at this boundary.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use ts_rs::TS;

use crate::household::{HouseholdCrudError, MemberError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AppError {
    /// Stable code the view layer switches on.
    pub code: String,
    /// Short text fit for a banner.
    pub message: String,
    /// Detail attached by the layer that failed: operation, collection, ids.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, string>")]
    pub context: HashMap<String, String>,
    /// The failure one layer down, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: AppError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)?;
        if !self.context.is_empty() {
            // stable order so logs and banners are diffable
            let mut entries: Vec<_> = self.context.iter().collect();
            entries.sort();
            f.write_str(" [")?;
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Fold store failures into the codes the app actually reacts to: a miss,
/// a constraint the schema enforces (duplicate member link, foreign key),
/// a row that would not decode, or an unreachable store. Everything else
/// is opaque.
impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("STORE/NOT_FOUND", "Record not found"),
            SqlxError::Database(db) => match db.constraint() {
                Some(constraint) => {
                    AppError::new("STORE/CONSTRAINT", db.message().to_string())
                        .with_context("constraint", constraint.to_string())
                }
                None => AppError::new("STORE/DATABASE", db.message().to_string()),
            },
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("STORE/DECODE", source.to_string()).with_context("column", index)
            }
            SqlxError::Decode(source) => AppError::new("STORE/DECODE", source.to_string()),
            SqlxError::PoolTimedOut | SqlxError::PoolClosed => AppError::new(
                "STORE/UNAVAILABLE",
                "The data store is not reachable right now",
            ),
            other => AppError::new("STORE/ERROR", other.to_string()),
        }
    }
}

impl From<HouseholdCrudError> for AppError {
    fn from(err: HouseholdCrudError) -> Self {
        let code = match &err {
            HouseholdCrudError::NotFound => "HOUSEHOLD/NOT_FOUND",
            HouseholdCrudError::DefaultUndeletable => "HOUSEHOLD/DEFAULT_UNDELETABLE",
            HouseholdCrudError::Deleted => "HOUSEHOLD/DELETED",
            HouseholdCrudError::Db(_) => "HOUSEHOLD/DB",
        };
        let message = err.to_string();
        match err {
            HouseholdCrudError::Db(db) => {
                AppError::new(code, message).with_cause(AppError::from(db))
            }
            _ => AppError::new(code, message),
        }
    }
}

impl From<MemberError> for AppError {
    fn from(err: MemberError) -> Self {
        let code = match &err {
            MemberError::InvalidDisplayName => "MEMBER/INVALID_DISPLAY_NAME",
            MemberError::InvalidEmail => "MEMBER/INVALID_EMAIL",
            MemberError::DuplicateMember => "MEMBER/DUPLICATE",
            MemberError::HouseholdUnavailable => "MEMBER/HOUSEHOLD_UNAVAILABLE",
            MemberError::ProfileNotFound => "MEMBER/PROFILE_NOT_FOUND",
            MemberError::MemberNotFound => "MEMBER/NOT_FOUND",
            MemberError::Db(_) => "MEMBER/DB",
        };
        let message = err.to_string();
        match err {
            MemberError::Db(db) => AppError::new(code, message).with_cause(AppError::from(db)),
            _ => AppError::new(code, message),
        }
    }
}
