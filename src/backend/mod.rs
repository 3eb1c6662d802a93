//! Backend gateway - the hosted database/auth/storage service
//!
//! Everything the client persists goes through the [`Backend`] trait:
//!
//! - table CRUD with filters, ordering and range pagination (`query`)
//! - the current authenticated user
//! - blob storage (upload + public URLs)
//!
//! `rest` talks to a PostgREST/GoTrue/Storage deployment over HTTP.
//! `memory` is an in-process stand-in used by the tests.

mod query;
mod rest;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use query::{Filter, Order, Query, RowRange};
pub use rest::{AuthSession, RestBackend};

/// Errors returned by any remote call
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Timeouts, connection failures and server-side errors may succeed on a second attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Transport(_) => true,
            BackendError::Http { status, .. } => *status >= 500,
            BackendError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            BackendError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// The authenticated user as reported by the auth service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Rows returned by a select, plus the exact total when it was requested
#[derive(Clone, Debug, Default)]
pub struct Rows {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn current_user(&self) -> Result<Option<UserIdentity>, BackendError>;

    async fn select(&self, table: &str, query: &Query) -> Result<Rows, BackendError>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    /// Apply `patch` to every row matching `filters` and return the updated rows
    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, BackendError>;

    /// Delete every row matching `filters` and return the deleted rows
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, BackendError>;

    /// Store `bytes` at `bucket/path` and return the stored object key
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}

/// Decode the single row an update/insert is expected to return
pub fn decode_single<T: DeserializeOwned>(
    rows: Vec<Value>,
    what: &str,
) -> Result<T, BackendError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Decode(format!("expected one {} row, got none", what)))?;
    Ok(serde_json::from_value(row)?)
}

/// Render a JSON value the way filters put it on the wire
pub(crate) fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn retryable_errors() {
        assert!(BackendError::Timeout.is_retryable());
        assert!(BackendError::Transport("reset".into()).is_retryable());
        assert!(BackendError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(!BackendError::Http { status: 409, message: String::new() }.is_retryable());
        assert!(!BackendError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn decode_single_requires_a_row() {
        let err = decode_single::<UserIdentity>(vec![], "profile").unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));

        let user: UserIdentity =
            decode_single(vec![json!({"id": "u1", "email": "a@b.c"})], "user").unwrap();
        assert_eq!(user.id, "u1");
    }

    #[test]
    fn params_strip_string_quotes() {
        assert_eq!(value_to_param(&json!("abc")), "abc");
        assert_eq!(value_to_param(&json!(42)), "42");
        assert_eq!(value_to_param(&Value::Null), "null");
    }
}
