//! Read-only collaborators the engine fetches snapshots from.
//!
//! Persistence is owned by the surrounding application; the engine only needs
//! these two lookups, awaited once at the start of every decision.

mod memory;

pub use memory::{MemoryStore, Snapshot};

use async_trait::async_trait;

use crate::models::{Group, Identity, RoleBinding, UserId};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

#[async_trait]
pub trait RoleBindingStore: Send + Sync {
    /// Bindings granted to `user_id`. Implementations may include inactive rows.
    async fn bindings_for(&self, user_id: &UserId) -> Result<Vec<RoleBinding>, StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Groups the identity names or is listed in, active or not.
    async fn groups_for(&self, identity: &Identity) -> Result<Vec<Group>, StoreError>;

    async fn group(&self, group_id: &str) -> Result<Option<Group>, StoreError>;
}
