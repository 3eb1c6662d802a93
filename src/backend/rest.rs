//! HTTP implementation of the backend gateway
//!
//! Tables go through PostgREST (`/rest/v1`), sessions through the auth service
//! (`/auth/v1`) and blobs through the storage service (`/storage/v1`). Every
//! request carries the project `apikey`; the bearer token is the signed-in
//! user's access token when there is one, the anon key otherwise.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::{log_api_request, log_api_result};

use super::query::parse_content_range_total;
use super::{Backend, BackendError, Filter, Query, Rows, UserIdentity};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// A signed-in session as returned by the auth service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserIdentity,
}

impl AuthSession {
    /// True when the access token expires within `margin` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at - now < margin
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserIdentity,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
            user: self.user,
        }
    }
}

#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    read_retries: u32,
    retry_backoff: Duration,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl RestBackend {
    pub fn new(config: &AppConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            read_retries: config.read_retries,
            retry_backoff: RETRY_BACKOFF,
            session: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        log_api_request!("auth.sign_in", email);
        let request = self
            .http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let result = async {
            let response = check_status(self.authorize(request).await.send().await?).await?;
            let token: TokenResponse = response.json().await?;
            Ok::<_, BackendError>(token.into_session())
        }
        .await;
        log_api_result!("auth.sign_in", result);
        result
    }

    /// Register a new account. Returns no session when the project requires
    /// email confirmation before the first sign in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, BackendError> {
        log_api_request!("auth.sign_up", email);
        let request = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .json(&json!({ "email": email, "password": password }));

        let result = async {
            let response = check_status(self.authorize(request).await.send().await?).await?;
            let body: Value = response.json().await?;
            Ok::<_, BackendError>(
                serde_json::from_value::<TokenResponse>(body)
                    .ok()
                    .map(TokenResponse::into_session),
            )
        }
        .await;
        log_api_result!("auth.sign_up", result);
        result
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        log_api_request!("auth.refresh", has_token = !refresh_token.is_empty());
        let request = self
            .http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let result = async {
            let response = check_status(self.authorize(request).await.send().await?).await?;
            let token: TokenResponse = response.json().await?;
            Ok::<_, BackendError>(token.into_session())
        }
        .await;
        log_api_result!("auth.refresh", result);
        result
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        };
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn with_read_retry<T, F, Fut>(&self, operation: &str, attempt: F) -> Result<T, BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        retry_read(operation, self.read_retries, self.retry_backoff, attempt).await
    }

    async fn select_once(&self, table: &str, query: &Query) -> Result<Rows, BackendError> {
        let mut request = self.http.get(self.table_url(table)).query(&query.to_params());
        if query.count_exact {
            request = request.header("Prefer", "count=exact");
        }
        let response = check_status(self.authorize(request).await.send().await?).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|h| h.to_str().ok())
            .and_then(parse_content_range_total);
        let rows: Vec<Value> = response.json().await?;
        Ok(Rows { rows, total })
    }

    async fn current_user_once(&self, access_token: &str) -> Result<Option<UserIdentity>, BackendError> {
        let request = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let response = request.send().await?;
        if response.status().as_u16() == 401 {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn write(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<Value>, BackendError> {
        let request = request.header("Prefer", "return=representation");
        let response = check_status(self.authorize(request).await.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn current_user(&self) -> Result<Option<UserIdentity>, BackendError> {
        let Some(token) = self.session().await.map(|s| s.access_token) else {
            return Ok(None);
        };
        log_api_request!("auth.current_user", has_token = true);
        let result = self
            .with_read_retry("auth.current_user", || self.current_user_once(&token))
            .await;
        log_api_result!("auth.current_user", result);
        result
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Rows, BackendError> {
        log_api_request!("select", table, filters = query.filters.len());
        let result = self
            .with_read_retry("select", || self.select_once(table, query))
            .await;
        log_api_result!("select", result);
        result
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        log_api_request!("insert", table, rows = rows.len());
        let request = self.http.post(self.table_url(table)).json(&rows);
        let result = self.write(request).await;
        log_api_result!("insert", result);
        result
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, BackendError> {
        log_api_request!("update", table, filters = filters.len());
        let params: Vec<(String, String)> = filters.iter().map(Filter::to_param).collect();
        let request = self.http.patch(self.table_url(table)).query(&params).json(&patch);
        let result = self.write(request).await;
        log_api_result!("update", result);
        result
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, BackendError> {
        log_api_request!("delete", table, filters = filters.len());
        let params: Vec<(String, String)> = filters.iter().map(Filter::to_param).collect();
        let request = self.http.delete(self.table_url(table)).query(&params);
        let result = self.write(request).await;
        log_api_result!("delete", result);
        result
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        log_api_request!("storage.upload", bucket, path, size = bytes.len());
        let request = self
            .http
            .post(format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path))
            .header("Content-Type", content_type)
            .body(bytes);

        let result = async {
            check_status(self.authorize(request).await.send().await?).await?;
            Ok::<_, BackendError>(path.to_string())
        }
        .await;
        log_api_result!("storage.upload", result);
        result
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

/// Run an idempotent read. Transient failures are retried up to `retries`
/// extra times, sleeping `backoff * n` before the n-th retry.
async fn retry_read<T, F, Fut>(
    operation: &str,
    retries: u32,
    backoff: Duration,
    attempt: F,
) -> Result<T, BackendError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && tries < retries => {
                tries += 1;
                tracing::warn!(operation, attempt = tries, error = %e, "Retrying read");
                tokio::time::sleep(backoff * tries).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Turn a non-success status into `BackendError::Http` with the service's message
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Http {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
