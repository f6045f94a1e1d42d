//! # Core Module
//!
//! Configuration shared by the binary and the feature layer.

pub mod config;

pub use config::Config;
