//! # Reminders Feature
//!
//! Scheduled reminder delivery with recurrence support.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true

pub mod model;
pub mod recurrence;
pub mod scheduler;

pub use model::{Reminder, ReminderPatch, ReminderStore, Repeat, DEFAULT_MESSAGE};
pub use recurrence::{next_occurrence, NextOccurrence};
pub use scheduler::{CycleReport, ReminderScheduler};
