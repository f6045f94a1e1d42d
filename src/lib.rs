// Core layer - shared configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;

// Re-export core config for convenience
pub use core::Config;

// Re-export feature items for convenience
pub use features::{
    // Audit
    AuditEvent, AuditSink,
    // Mail
    HttpMailer, Notifier,
    // Reminders
    CycleReport, Reminder, ReminderScheduler, Repeat,
    // Users
    User, UserLookup,
};

pub use database::Database;
