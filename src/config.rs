// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_STORAGE_KEY: &str = "scoutcomp.auth";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the ScoutComp REST API, without trailing slash
    pub api_base_url: String,
    /// Directory holding the persisted session
    pub session_dir: PathBuf,
    /// Storage key of the persisted session (file stem)
    pub storage_key: String,
    /// Transport timeout applied to every request
    pub request_timeout: Duration,
    /// Upper bound on a token refresh; waiters fail once it elapses
    pub refresh_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            session_dir: PathBuf::from("."),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_base_url = text_var("SCOUTCOMP_API_URL", DEFAULT_API_URL)?
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "SCOUTCOMP_API_URL",
                value: api_base_url,
            });
        }

        Ok(Self {
            api_base_url,
            session_dir: PathBuf::from(text_var("SCOUTCOMP_SESSION_DIR", ".")?),
            storage_key: text_var("SCOUTCOMP_STORAGE_KEY", DEFAULT_STORAGE_KEY)?,
            request_timeout: duration_var("SCOUTCOMP_REQUEST_TIMEOUT_SECS")?,
            refresh_timeout: duration_var("SCOUTCOMP_REFRESH_TIMEOUT_SECS")?,
        })
    }

    /// Path of the file backing the persisted session.
    pub fn session_file(&self) -> PathBuf {
        self.session_dir.join(format!("{}.json", self.storage_key))
    }
}

/// Read a text variable, falling back to `default` when unset. A variable
/// that is set but blank is an error rather than a silent default.
fn text_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Missing(name)),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

fn duration_var(name: &'static str) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid { name, value }),
        Err(_) => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing value for environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
