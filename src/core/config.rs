//! # Configuration
//!
//! Environment-driven configuration, loaded once at startup (a `.env` file
//! is honored via dotenvy in the binary).

use anyhow::{bail, Context, Result};

/// Runtime configuration for the tracker backend
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Seconds between scheduler cycles; bounds delivery latency
    pub poll_interval_secs: u64,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub log_level: String,
    /// When false, a failed delivery leaves the reminder due for retry
    pub progress_on_notify_failure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_path: env_or("DATABASE_PATH", "tracker.db"),
            poll_interval_secs: parse_interval(&env_or("POLL_INTERVAL_SECS", "60"))
                .context("POLL_INTERVAL_SECS must be a positive number of seconds")?,
            mail_api_url: required("MAIL_API_URL")?,
            mail_api_key: required("MAIL_API_KEY")?,
            mail_from: env_or("MAIL_FROM", "reminders@medikeep.local"),
            log_level: env_or("LOG_LEVEL", "info"),
            progress_on_notify_failure: parse_flag(&env_or("PROGRESS_ON_NOTIFY_FAILURE", "true"))
                .context("PROGRESS_ON_NOTIFY_FAILURE must be a boolean")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

/// A zero interval would panic the scheduler's timer, so it is rejected
/// here rather than discovered after the task has been spawned.
fn parse_interval(raw: &str) -> Result<u64> {
    let secs: u64 = raw.parse().context("expected a number of seconds")?;
    if secs == 0 {
        bail!("interval must be at least one second");
    }
    Ok(secs)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("expected a boolean, got: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_rejects_zero() {
        assert_eq!(parse_interval("60").unwrap(), 60);
        assert_eq!(parse_interval("1").unwrap(), 1);
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-5").is_err());
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag("YES").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
