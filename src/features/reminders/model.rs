//! Reminder domain model and storage contract.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body used when a reminder carries no message of its own
pub const DEFAULT_MESSAGE: &str = "You have a reminder";

/// Recurrence rule governing automatic rescheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Repeat {
    /// String form used for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
            Repeat::Monthly => "monthly",
        }
    }

    /// Parse a stored rule. An unknown value is a data fault: callers must
    /// leave the row untouched rather than guess.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Repeat::None),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            "monthly" => Ok(Repeat::Monthly),
            other => bail!("unknown repeat rule: {other}"),
        }
    }
}

/// A scheduled reminder owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub message: Option<String>,
    pub remind_at: DateTime<Utc>,
    pub repeat: Repeat,
    pub done: bool,
}

impl Reminder {
    /// Email subject for this reminder
    pub fn subject(&self) -> String {
        format!("Reminder: {}", self.title)
    }

    /// Email body, falling back to the stock notice
    pub fn body(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_MESSAGE)
    }
}

/// The atomic per-record update the scheduler writes back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPatch {
    pub remind_at: DateTime<Utc>,
    pub done: bool,
}

/// Durable reminder storage as seen by the scheduler
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All reminders with `remind_at <= now` and `done = false`. Ordering
    /// is not significant.
    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Atomically update the reminder with the given id.
    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<()>;
}
