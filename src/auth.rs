use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;

use crate::backend::{AuthSession, Backend, Query, RestBackend};
use crate::config::AppConfig;
use crate::model::PROFILES_TABLE;

const SESSION_FILE: &str = "session.json";
/// Refresh once the access token has less than this left
const REFRESH_MARGIN_SECS: i64 = 300;

pub fn session_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(SESSION_FILE)
}

pub fn load_cached_session(path: &Path) -> Option<AuthSession> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Ignoring unreadable session cache");
            None
        }
    }
}

pub fn save_session(path: &Path, session: &AuthSession) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(session)?)?;
    tracing::debug!(path = %path.display(), "Saved session to disk");
    Ok(())
}

pub fn clear_cached_session(path: &Path) {
    if path.exists() {
        let _ = fs::remove_file(path);
    }
}

pub fn needs_refresh(session: &AuthSession) -> bool {
    session.expires_within(Utc::now(), chrono::Duration::seconds(REFRESH_MARGIN_SECS))
}

/// True when a profile already uses `email`
pub async fn email_registered(backend: &dyn Backend, email: &str) -> Result<bool> {
    let query = Query::select("id").eq("email", email);
    let rows = backend.select(PROFILES_TABLE, &query).await?.rows;
    Ok(!rows.is_empty())
}

/// Establish the session the backend uses for the rest of the run.
///
/// Configured credentials win (signing up first when asked to); otherwise the
/// cached session is reused, refreshed if it is about to expire. `None` means
/// the client runs anonymously and user-only actions ask to log in.
pub async fn authenticate(backend: &RestBackend, config: &AppConfig) -> Result<Option<AuthSession>> {
    let cache = session_path(&config.cache_dir);

    let session = if let Some((email, password)) = config.credentials() {
        Some(sign_in(backend, config, email, password).await?)
    } else if let Some(cached) = load_cached_session(&cache) {
        tracing::info!(user_id = %cached.user.id, "Found cached session");
        if needs_refresh(&cached) {
            match backend.refresh_session(&cached.refresh_token).await {
                Ok(fresh) => Some(fresh),
                Err(e) => {
                    tracing::warn!(error = %e, "Cached session could not be refreshed, continuing signed out");
                    clear_cached_session(&cache);
                    None
                }
            }
        } else {
            Some(cached)
        }
    } else {
        tracing::info!("No credentials or cached session, continuing signed out");
        None
    };

    if let Some(session) = &session {
        if let Err(e) = save_session(&cache, session) {
            tracing::warn!(error = %e, "Could not cache session");
        }
    }
    backend.set_session(session.clone()).await;
    Ok(session)
}

async fn sign_in(
    backend: &RestBackend,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<AuthSession> {
    if config.sign_up {
        if email_registered(backend, email).await? {
            bail!("An account with email {} already exists. Sign in instead.", email);
        }
        tracing::info!(email, "Registering new account");
        if let Some(session) = backend
            .sign_up(email, password)
            .await
            .context("Sign up failed")?
        {
            return Ok(session);
        }
        tracing::info!("Sign up needs confirmation, trying to sign in");
    }

    let session = backend
        .sign_in_with_password(email, password)
        .await
        .context("Sign in failed")?;
    tracing::info!(user_id = %session.user.id, "Signed in");
    Ok(session)
}

/// Refresh the backend's session when it is close to expiry. Returns whether
/// a refresh happened.
pub async fn refresh_if_needed(backend: &RestBackend, cache_dir: &Path) -> Result<bool> {
    let Some(session) = backend.session().await else {
        return Ok(false);
    };
    if !needs_refresh(&session) {
        return Ok(false);
    }

    tracing::info!("Access token expiring soon, refreshing");
    let fresh = backend.refresh_session(&session.refresh_token).await?;
    save_session(&session_path(cache_dir), &fresh)?;
    backend.set_session(Some(fresh)).await;
    tracing::info!("Access token refreshed");
    Ok(true)
}
