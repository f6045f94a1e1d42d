//! # Feature: Reminder Scheduling
//!
//! Background due-polling engine. Each tick scans for reminders whose
//! trigger time has passed, emails the owner, records an audit event, and
//! either completes the reminder or advances it to its next occurrence.
//! Delivery is best-effort: a failed email is logged, never retried within
//! the cycle, and (under the default policy) never blocks rescheduling.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Delivery-failure policy made configurable (progress vs retry)
//! - 1.0.0: Initial release replacing the external cron job

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::model::{Reminder, ReminderPatch, ReminderStore};
use super::recurrence::next_occurrence;
use crate::features::audit::{AuditSink, ACTION_SENT_REMINDER_EMAIL};
use crate::features::mail::Notifier;
use crate::features::users::UserLookup;

/// Outcome counters for one pass over the due reminders
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub due: usize,
    pub notified: usize,
    pub completed: usize,
    pub rescheduled: usize,
    pub skipped_missing_owner: usize,
    /// Deliveries that failed under the retry policy; left due on purpose
    pub held_for_retry: usize,
    pub failed: usize,
}

/// Polls the reminder store on a fixed interval and delivers due reminders
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    users: Arc<dyn UserLookup>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    interval: Duration,
    progress_on_notify_failure: bool,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        users: Arc<dyn UserLookup>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        interval: Duration,
    ) -> Self {
        ReminderScheduler {
            store,
            users,
            notifier,
            audit,
            interval,
            progress_on_notify_failure: true,
        }
    }

    /// Whether a reminder still completes or reschedules when its email
    /// fails. Defaults to true: a dead mailbox must not pin a reminder in
    /// the due set forever. Set to false to leave failed deliveries due so
    /// the next cycle retries them.
    pub fn progress_on_notify_failure(mut self, enabled: bool) -> Self {
        self.progress_on_notify_failure = enabled;
        self
    }

    /// Run cycles until the shutdown channel flips.
    ///
    /// The loop awaits each cycle to completion before the next tick, so
    /// cycles never overlap; `MissedTickBehavior::Delay` makes a slow cycle
    /// push the next tick back instead of letting ticks stack. Shutdown is
    /// observed between cycles, so an in-flight cycle finishes and leaves
    /// nothing half-written beyond what atomic per-record writes allow.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Reminder scheduler started (tick every {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle(Utc::now()).await {
                        Ok(report) if report.due > 0 => {
                            info!(
                                "Cycle done: {} due, {} notified, {} rescheduled, {} completed, {} skipped, {} held, {} failed",
                                report.due,
                                report.notified,
                                report.rescheduled,
                                report.completed,
                                report.skipped_missing_owner,
                                report.held_for_retry,
                                report.failed
                            );
                        }
                        Ok(_) => debug!("Cycle done: nothing due"),
                        Err(e) => error!("Cycle aborted: {e:#}"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Reminder scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// One pass over every reminder due at `now`.
    ///
    /// `now` is snapshotted once by the caller so all due-comparisons in
    /// the pass agree; a reminder becoming due mid-pass waits for the next
    /// one. A store failure here aborts the pass before any side effects;
    /// a failure on an individual reminder is contained to that reminder.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let due = self
            .store
            .query_due(now)
            .await
            .context("due-reminder query failed")?;

        debug!("Found {} due reminders at {now}", due.len());

        let mut report = CycleReport {
            due: due.len(),
            ..CycleReport::default()
        };

        for reminder in &due {
            if let Err(e) = self.process_one(reminder, &mut report).await {
                report.failed += 1;
                error!("Failed to process reminder {}: {e:#}", reminder.id);
            }
        }

        Ok(report)
    }

    async fn process_one(&self, reminder: &Reminder, report: &mut CycleReport) -> Result<()> {
        debug!("Processing reminder {} ({})", reminder.id, reminder.title);

        let user = match self.users.by_id(&reminder.owner).await? {
            Some(user) => user,
            None => {
                // Data anomaly: skip wholesale, no notification and no mutation.
                warn!(
                    "Owner {} missing for reminder {}, skipping",
                    reminder.owner, reminder.id
                );
                report.skipped_missing_owner += 1;
                return Ok(());
            }
        };

        let delivered = match self
            .notifier
            .send(&user.email, &reminder.subject(), reminder.body())
            .await
        {
            Ok(delivery_id) => {
                debug!(
                    "Email sent to {} for reminder {}, delivery id: {delivery_id}",
                    user.email, reminder.id
                );
                report.notified += 1;
                true
            }
            Err(e) => {
                warn!("Email delivery failed for reminder {}: {e:#}", reminder.id);
                false
            }
        };

        if delivered {
            // An audit failure is logged but never blocks the state transition.
            if let Err(e) = self
                .audit
                .append(
                    &user.id,
                    ACTION_SENT_REMINDER_EMAIL,
                    json!({ "reminder": reminder.id }),
                )
                .await
            {
                warn!("Audit append failed for reminder {}: {e:#}", reminder.id);
            }
        } else if !self.progress_on_notify_failure {
            // Retry policy: leave the reminder due so the next cycle redelivers.
            report.held_for_retry += 1;
            return Ok(());
        }

        let next = next_occurrence(reminder.remind_at, reminder.repeat)?;
        self.store
            .update(
                &reminder.id,
                ReminderPatch {
                    remind_at: next.remind_at,
                    done: next.done,
                },
            )
            .await
            .context("reminder update failed")?;

        if next.done {
            debug!("Reminder {} completed", reminder.id);
            report.completed += 1;
        } else {
            debug!("Reminder {} rescheduled for {}", reminder.id, next.remind_at);
            report.rescheduled += 1;
        }

        Ok(())
    }
}
