//! Runtime configuration read from the environment (and `.env`, if present)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_RETRIES: u32 = 2;
const DEFAULT_CACHE_DIR: &str = ".cache";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend_url: String,
    pub anon_key: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub sign_up: bool,
    pub request_timeout: Duration,
    pub read_retries: u32,
    pub cache_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout = match optional("TUNEBASE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse()
                    .with_context(|| format!("TUNEBASE_TIMEOUT_SECS is not a number: {}", v))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let read_retries = match optional("TUNEBASE_READ_RETRIES") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("TUNEBASE_READ_RETRIES is not a number: {}", v))?,
            None => DEFAULT_READ_RETRIES,
        };
        let sign_up = optional("TUNEBASE_SIGN_UP")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            backend_url: required("TUNEBASE_URL")?,
            anon_key: required("TUNEBASE_ANON_KEY")?,
            email: optional("TUNEBASE_EMAIL"),
            password: optional("TUNEBASE_PASSWORD"),
            sign_up,
            request_timeout,
            read_retries,
            cache_dir: optional("TUNEBASE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
        })
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}
