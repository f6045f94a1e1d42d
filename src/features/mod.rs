//! # Features Layer
//!
//! Feature modules of the tracker backend.

pub mod audit;
pub mod mail;
pub mod reminders;
pub mod users;

pub use audit::{AuditEvent, AuditSink};
pub use mail::{HttpMailer, Notifier};
pub use reminders::{CycleReport, Reminder, ReminderScheduler, Repeat};
pub use users::{User, UserLookup};
