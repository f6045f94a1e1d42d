//! # Users Feature
//!
//! Read-only view of the account directory. Background delivery only ever
//! reads a user's id and email; account management lives elsewhere.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An account holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Lookup into the user directory
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Resolve a user by id. `Ok(None)` means no such user exists.
    async fn by_id(&self, id: &str) -> Result<Option<User>>;
}
