//! # Database Module
//!
//! Sqlite persistence for users, reminders, and the audit log. All access
//! goes through a single connection behind an async mutex; every statement
//! is one atomic read or write, which is the only transactional guarantee
//! the scheduler relies on. The CRUD surface here is what the user-facing
//! API layer calls; the scheduler only sees the collaborator traits.

pub mod memory;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{error, warn};
use serde_json::Value;
use sqlite::{Connection, State, Statement};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::features::audit::{AuditEvent, AuditSink};
use crate::features::reminders::{Reminder, ReminderPatch, ReminderStore, Repeat};
use crate::features::users::{User, UserLookup};

/// Timestamp format shared by every table. Fixed-width UTC, so the TEXT
/// comparison in the due query matches chronological order.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .with_context(|| format!("bad timestamp: {raw}"))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn read_reminder(statement: &Statement<'_>) -> Result<Reminder> {
    let remind_at = parse_ts(&statement.read::<String, _>("remind_at")?)?;
    let repeat = Repeat::parse(&statement.read::<String, _>("repeat")?)?;
    Ok(Reminder {
        id: statement.read::<String, _>("id")?,
        owner: statement.read::<String, _>("owner")?,
        title: statement.read::<String, _>("title")?,
        message: statement.read::<Option<String>, _>("message")?,
        remind_at,
        repeat,
        done: statement.read::<i64, _>("done")? != 0,
    })
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("failed to open database at {path}"))?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT,
                remind_at TEXT NOT NULL,
                repeat TEXT NOT NULL DEFAULT 'none',
                done INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                action TEXT NOT NULL,
                meta TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;

        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Create a reminder for a user, returning the new id
    pub async fn add_reminder(
        &self,
        owner: &str,
        title: &str,
        message: Option<&str>,
        remind_at: DateTime<Utc>,
        repeat: Repeat,
    ) -> Result<String> {
        if title.trim().is_empty() {
            bail!("reminder title must not be empty");
        }

        let id = Uuid::new_v4().to_string();
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO reminders (id, owner, title, message, remind_at, repeat, done)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )?;
        statement.bind((1, id.as_str()))?;
        statement.bind((2, owner))?;
        statement.bind((3, title))?;
        statement.bind((4, message))?;
        statement.bind((5, format_ts(remind_at).as_str()))?;
        statement.bind((6, repeat.as_str()))?;
        statement.next()?;
        Ok(id)
    }

    /// All reminders belonging to one user, soonest first
    pub async fn reminders_for_user(&self, owner: &str) -> Result<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "SELECT id, owner, title, message, remind_at, repeat, done
             FROM reminders WHERE owner = ? ORDER BY remind_at ASC",
        )?;
        statement.bind((1, owner))?;

        let mut reminders = Vec::new();
        while let State::Row = statement.next()? {
            match read_reminder(&statement) {
                Ok(reminder) => reminders.push(reminder),
                Err(e) => error!("Skipping malformed reminder row: {e:#}"),
            }
        }
        Ok(reminders)
    }

    /// Mark a reminder done on the user's behalf. Unlike the scheduler's own
    /// completion logic this applies to repeating reminders too; it is an
    /// explicit user override.
    pub async fn mark_done(&self, id: &str, owner: &str) -> Result<bool> {
        let connection = self.connection.lock().await;
        let mut statement =
            connection.prepare("UPDATE reminders SET done = 1 WHERE id = ? AND owner = ?")?;
        statement.bind((1, id))?;
        statement.bind((2, owner))?;
        statement.next()?;
        Ok(connection.change_count() > 0)
    }

    /// Delete a reminder if it belongs to the given user
    pub async fn delete_reminder(&self, id: &str, owner: &str) -> Result<bool> {
        let connection = self.connection.lock().await;
        let mut statement =
            connection.prepare("DELETE FROM reminders WHERE id = ? AND owner = ?")?;
        statement.bind((1, id))?;
        statement.bind((2, owner))?;
        statement.next()?;
        Ok(connection.change_count() > 0)
    }

    /// Insert or refresh a user record
    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO users (id, email, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name",
        )?;
        statement.bind((1, user.id.as_str()))?;
        statement.bind((2, user.email.as_str()))?;
        statement.bind((3, user.name.as_str()))?;
        statement.next()?;
        Ok(())
    }

    /// Most recent audit events, newest first
    pub async fn recent_audit_events(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "SELECT user, action, meta, created_at FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;
        statement.bind((1, limit))?;

        let mut events = Vec::new();
        while let State::Row = statement.next()? {
            let meta_raw = statement.read::<String, _>("meta")?;
            let meta = serde_json::from_str(&meta_raw).unwrap_or_else(|e| {
                warn!("Corrupt audit meta ({meta_raw:?}), substituting null: {e}");
                Value::Null
            });
            events.push(AuditEvent {
                user: statement.read::<String, _>("user")?,
                action: statement.read::<String, _>("action")?,
                meta,
                at: parse_ts(&statement.read::<String, _>("created_at")?)?,
            });
        }
        Ok(events)
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "SELECT id, owner, title, message, remind_at, repeat, done
             FROM reminders WHERE remind_at <= ? AND done = 0",
        )?;
        statement.bind((1, format_ts(now).as_str()))?;

        let mut due = Vec::new();
        while let State::Row = statement.next()? {
            match read_reminder(&statement) {
                // A row we cannot decode is left untouched for a human to
                // repair; the rest of the batch proceeds.
                Ok(reminder) => due.push(reminder),
                Err(e) => error!("Skipping undecodable due reminder: {e:#}"),
            }
        }
        Ok(due)
    }

    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<()> {
        let connection = self.connection.lock().await;
        let mut statement =
            connection.prepare("UPDATE reminders SET remind_at = ?, done = ? WHERE id = ?")?;
        statement.bind((1, format_ts(patch.remind_at).as_str()))?;
        statement.bind((2, patch.done as i64))?;
        statement.bind((3, id))?;
        statement.next()?;

        if connection.change_count() == 0 {
            bail!("no reminder with id {id}");
        }
        Ok(())
    }
}

#[async_trait]
impl UserLookup for Database {
    async fn by_id(&self, id: &str) -> Result<Option<User>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare("SELECT id, email, name FROM users WHERE id = ?")?;
        statement.bind((1, id))?;

        if let State::Row = statement.next()? {
            Ok(Some(User {
                id: statement.read::<String, _>("id")?,
                email: statement.read::<String, _>("email")?,
                name: statement.read::<String, _>("name")?,
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl AuditSink for Database {
    async fn append(&self, user_id: &str, action: &str, meta: Value) -> Result<()> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO audit_log (user, action, meta, created_at) VALUES (?, ?, ?, ?)",
        )?;
        statement.bind((1, user_id))?;
        statement.bind((2, action))?;
        statement.bind((3, meta.to_string().as_str()))?;
        statement.bind((4, format_ts(Utc::now()).as_str()))?;
        statement.next()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    async fn database() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: "Pat".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_list_reminders() {
        let db = database().await;
        let id = db
            .add_reminder("u1", "Blood pressure check", Some("Before breakfast"), at(2024, 5, 1, 8), Repeat::Daily)
            .await
            .unwrap();

        let reminders = db.reminders_for_user("u1").await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].id, id);
        assert_eq!(reminders[0].title, "Blood pressure check");
        assert_eq!(reminders[0].message.as_deref(), Some("Before breakfast"));
        assert_eq!(reminders[0].remind_at, at(2024, 5, 1, 8));
        assert_eq!(reminders[0].repeat, Repeat::Daily);
        assert!(!reminders[0].done);

        assert!(db.reminders_for_user("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let db = database().await;
        assert!(db
            .add_reminder("u1", "   ", None, at(2024, 5, 1, 8), Repeat::None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_query_due_boundary_and_flags() {
        let db = database().await;
        let now = at(2024, 5, 10, 12);
        db.add_reminder("u1", "past", None, at(2024, 5, 10, 11), Repeat::None).await.unwrap();
        db.add_reminder("u1", "exactly now", None, now, Repeat::None).await.unwrap();
        db.add_reminder("u1", "future", None, at(2024, 5, 10, 13), Repeat::None).await.unwrap();
        let finished = db.add_reminder("u1", "finished", None, at(2024, 5, 10, 10), Repeat::None).await.unwrap();
        db.mark_done(&finished, "u1").await.unwrap();

        let due = db.query_due(now).await.unwrap();
        let mut titles: Vec<_> = due.iter().map(|r| r.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, ["exactly now", "past"]);
    }

    #[tokio::test]
    async fn test_update_persists_patch() {
        let db = database().await;
        let id = db.add_reminder("u1", "weekly", None, at(2024, 5, 1, 8), Repeat::Weekly).await.unwrap();

        db.update(&id, ReminderPatch { remind_at: at(2024, 5, 8, 8), done: false })
            .await
            .unwrap();

        let reminders = db.reminders_for_user("u1").await.unwrap();
        assert_eq!(reminders[0].remind_at, at(2024, 5, 8, 8));
        assert!(!reminders[0].done);

        assert!(db
            .update("missing", ReminderPatch { remind_at: at(2024, 5, 8, 8), done: true })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_mark_done_is_scoped_to_owner() {
        let db = database().await;
        let id = db.add_reminder("u1", "repeating", None, at(2024, 5, 1, 8), Repeat::Monthly).await.unwrap();

        // Wrong owner changes nothing.
        assert!(!db.mark_done(&id, "u2").await.unwrap());
        // Owner override works even for a repeating reminder.
        assert!(db.mark_done(&id, "u1").await.unwrap());
        assert!(db.reminders_for_user("u1").await.unwrap()[0].done);
    }

    #[tokio::test]
    async fn test_delete_reminder() {
        let db = database().await;
        let id = db.add_reminder("u1", "old", None, at(2024, 5, 1, 8), Repeat::None).await.unwrap();

        assert!(!db.delete_reminder(&id, "u2").await.unwrap());
        assert!(db.delete_reminder(&id, "u1").await.unwrap());
        assert!(db.reminders_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_lookup_round_trip() {
        let db = database().await;
        assert!(db.by_id("u1").await.unwrap().is_none());

        db.upsert_user(&sample_user()).await.unwrap();
        let found = db.by_id("u1").await.unwrap().unwrap();
        assert_eq!(found.email, "u1@example.com");

        // Upsert refreshes in place.
        let mut updated = sample_user();
        updated.email = "new@example.com".to_string();
        db.upsert_user(&updated).await.unwrap();
        assert_eq!(db.by_id("u1").await.unwrap().unwrap().email, "new@example.com");
    }

    #[tokio::test]
    async fn test_audit_append_and_read_back() {
        let db = database().await;
        db.append("u1", "sent_reminder_email", json!({ "reminder": "r1" })).await.unwrap();
        db.append("u1", "sent_reminder_email", json!({ "reminder": "r2" })).await.unwrap();

        let events = db.recent_audit_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        // Newest first.
        assert_eq!(events[0].meta, json!({ "reminder": "r2" }));
        assert_eq!(events[1].user, "u1");
        assert_eq!(events[1].action, "sent_reminder_email");
    }

    #[tokio::test]
    async fn test_corrupt_audit_meta_reads_back_as_null() {
        let db = database().await;
        db.append("u1", "sent_reminder_email", json!({ "reminder": "r1" })).await.unwrap();
        {
            let connection = db.connection.lock().await;
            connection
                .execute(
                    "INSERT INTO audit_log (user, action, meta, created_at)
                     VALUES ('u1', 'sent_reminder_email', '{not json', '2024-05-01 08:00:00')",
                )
                .unwrap();
        }

        let events = db.recent_audit_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].meta, Value::Null);
        assert_eq!(events[1].meta, json!({ "reminder": "r1" }));
    }

    #[tokio::test]
    async fn test_unknown_repeat_row_is_skipped_not_fatal() {
        let db = database().await;
        db.add_reminder("u1", "good", None, at(2024, 5, 1, 8), Repeat::Daily).await.unwrap();
        {
            let connection = db.connection.lock().await;
            connection
                .execute(
                    "INSERT INTO reminders (id, owner, title, message, remind_at, repeat, done)
                     VALUES ('bad', 'u1', 'bad', NULL, '2024-05-01 08:00:00', 'fortnightly', 0)",
                )
                .unwrap();
        }

        let due = db.query_due(at(2024, 5, 2, 8)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "good");
    }
}
