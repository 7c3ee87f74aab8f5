use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_CWA_URL: &str = "http://calibre-web-automated-book-downloader:8084";
pub const DEFAULT_DB_PATH: &str = "/data/watchers.db";

/// Login for the book downloader
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Shelf feed to poll. Polling is disabled when unset.
    pub feed_url: Option<String>,
    pub poll_interval: Duration,
    pub cwa_url: String,
    pub credentials: Option<Credentials>,
    pub db_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_interval = match non_empty("POLL_INTERVAL") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .context("POLL_INTERVAL must be a whole number of seconds")?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        let credentials = match (non_empty("CWA_USER"), non_empty("CWA_PASS")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            feed_url: non_empty("GOODREADS_RSS_URL"),
            poll_interval: Duration::from_secs(poll_interval),
            cwa_url: non_empty("CWA_URL")
                .unwrap_or_else(|| DEFAULT_CWA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            credentials,
            db_path: non_empty("WATCHER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        })
    }
}
