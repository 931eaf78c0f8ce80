//! Remote collection client.
//!
//! The REST collection is the secondary source: it seeds the table store and
//! assigns ids to newly created items.

mod client;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{Todo, TodoPatch};

pub use client::{RestClient, DEFAULT_COLLECTION_URL};

/// CRUD over a REST collection keyed by numeric id.
///
/// Each call issues exactly one request. There are no retries.
#[async_trait]
pub trait TodoCollection: Send + Sync {
    async fn list(&self) -> Result<Vec<Todo>, RemoteError>;

    async fn get(&self, id: i64) -> Result<Todo, RemoteError>;

    /// Creates an open item. The server assigns the id.
    async fn create(&self, title: &str) -> Result<Todo, RemoteError>;

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<Todo, RemoteError>;

    async fn delete(&self, id: i64) -> Result<(), RemoteError>;
}
