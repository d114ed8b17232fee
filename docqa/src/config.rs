use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_HISTORY_WINDOW: usize = 40;
pub const MAX_TOP_K: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub top_k: u32,
    /// Prior turns sent with each question; `None` sends all of them.
    pub history_window: Option<usize>,
    pub max_poll_failures: Option<u32>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            top_k: DEFAULT_TOP_K,
            history_window: Some(DEFAULT_HISTORY_WINDOW),
            max_poll_failures: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval_ms: u64 = parse_or(&lookup, "DOCQA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            bail!("DOCQA_POLL_INTERVAL_MS must be greater than zero");
        }

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "DOCQA_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if request_timeout_secs == 0 {
            bail!("DOCQA_REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let top_k: u32 = parse_or(&lookup, "DOCQA_TOP_K", DEFAULT_TOP_K)?;
        if !(1..=MAX_TOP_K).contains(&top_k) {
            bail!("DOCQA_TOP_K must be between 1 and {MAX_TOP_K}, got {top_k}");
        }

        let history_window: usize = parse_or(&lookup, "DOCQA_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?;

        let max_poll_failures = match lookup("DOCQA_MAX_POLL_FAILURES") {
            Some(raw) if !raw.trim().is_empty() => {
                let n: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("DOCQA_MAX_POLL_FAILURES is not a number: {raw}"))?;
                (n > 0).then_some(n)
            }
            _ => None,
        };

        Ok(Config {
            api_url: lookup("DOCQA_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            top_k,
            history_window: (history_window > 0).then_some(history_window),
            max_poll_failures,
            log_level: lookup("LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a valid number: {raw}")),
        None => Ok(default),
    }
}
