//! Remote table store client.
//!
//! The table store is the system of record for display once it is reachable.
//! It supports plain CRUD plus a change-notification channel.

mod client;
mod event;
mod realtime;
mod subscription;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{Todo, TodoPatch};

pub use client::{StoreCredentials, SupabaseStore, DEFAULT_CHANNEL, DEFAULT_TABLE};
pub use event::{ChangeEvent, ChangeKind, ChannelMessage, SubscriptionStatus};
pub use subscription::Subscription;

/// Operations on the hosted `todos` table.
///
/// Failures come back as `Err` values rather than panics so callers can
/// degrade instead of tearing down the view.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Reads up to `limit` rows.
    async fn select_all(&self, limit: usize) -> Result<Vec<Todo>, RemoteError>;

    /// Reads the ids of every row.
    async fn select_ids(&self) -> Result<Vec<i64>, RemoteError>;

    /// Inserts rows and returns them as stored.
    async fn insert(&self, items: &[Todo]) -> Result<Vec<Todo>, RemoteError>;

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<(), RemoteError>;

    async fn delete(&self, id: i64) -> Result<(), RemoteError>;

    /// Deletes every row.
    async fn delete_all(&self) -> Result<(), RemoteError>;

    /// Cheap read that fails when the table is not accessible.
    async fn ping(&self) -> Result<(), RemoteError>;

    /// Opens the change-notification channel.
    ///
    /// Returning `Ok` only means the connection is open. The subscription is
    /// live once it yields `SubscriptionStatus::Subscribed`.
    async fn subscribe(&self) -> Result<Subscription, RemoteError>;
}
