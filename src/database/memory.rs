//! In-memory collaborators for embedding and tests.
//!
//! `MemoryStore` honors the same per-record atomicity contract as the
//! sqlite store: every update goes through the map's entry lock.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::features::audit::{AuditEvent, AuditSink};
use crate::features::reminders::{Reminder, ReminderPatch, ReminderStore};
use crate::features::users::{User, UserLookup};

/// DashMap-backed reminder and user store
#[derive(Default)]
pub struct MemoryStore {
    reminders: DashMap<String, Reminder>,
    users: DashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reminder(&self, reminder: Reminder) {
        self.reminders.insert(reminder.id.clone(), reminder);
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn reminder(&self, id: &str) -> Option<Reminder> {
        self.reminders.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn query_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        Ok(self
            .reminders
            .iter()
            .filter(|entry| entry.remind_at <= now && !entry.done)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update(&self, id: &str, patch: ReminderPatch) -> Result<()> {
        match self.reminders.get_mut(id) {
            Some(mut entry) => {
                entry.remind_at = patch.remind_at;
                entry.done = patch.done;
                Ok(())
            }
            None => bail!("no reminder with id {id}"),
        }
    }
}

#[async_trait]
impl UserLookup for MemoryStore {
    async fn by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }
}

/// Audit sink that keeps events in memory, append-only
#[derive(Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAudit {
    async fn append(&self, user_id: &str, action: &str, meta: Value) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(AuditEvent {
            user: user_id.to_string(),
            action: action.to_string(),
            meta,
            at: Utc::now(),
        });
        Ok(())
    }
}
