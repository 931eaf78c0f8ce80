//! Manual store maintenance: one-off sync, clearing, and table checks.
//!
//! These never return `Err`. Each reports an [`OperationOutcome`] so a view
//! can show the message without handling failures itself.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::Todo;
use crate::rest::TodoCollection;
use crate::store::TableStore;

/// Result of a maintenance operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_count: Option<usize>,
}

impl OperationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// The message to show: the error for failures, otherwise the message.
    pub fn summary(&self) -> &str {
        let text = if self.success {
            self.message.as_deref()
        } else {
            self.error.as_deref()
        };
        text.unwrap_or(if self.success { "Done" } else { "Unknown error" })
    }
}

/// Copies the first `limit` REST items into the store, skipping ids the
/// store already has.
pub async fn sync_to_store<C, S>(collection: &C, store: &S, limit: usize) -> OperationOutcome
where
    C: TodoCollection + ?Sized,
    S: TableStore + ?Sized,
{
    tracing::info!("Starting manual sync from REST collection to table store");

    let mut rest_todos = match collection.list().await {
        Ok(todos) => todos,
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
            return OperationOutcome::failed(e);
        }
    };
    rest_todos.truncate(limit);
    tracing::info!("Fetched {} todos from REST collection", rest_todos.len());

    let existing_ids: HashSet<i64> = match store.select_ids().await {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            tracing::error!("Error fetching existing todos: {}", e);
            return OperationOutcome::failed(e);
        }
    };
    tracing::info!("Found {} existing todos in table store", existing_ids.len());

    let new_todos: Vec<Todo> = rest_todos
        .into_iter()
        .filter(|t| !existing_ids.contains(&t.id))
        .collect();

    if new_todos.is_empty() {
        return OperationOutcome {
            existing_count: Some(existing_ids.len()),
            ..OperationOutcome::ok("No new todos to sync")
        };
    }

    tracing::info!("Preparing to insert {} new todos", new_todos.len());
    match store.insert(&new_todos).await {
        Ok(inserted) => {
            let count = inserted.len();
            tracing::info!("Synced {} todos to table store", count);
            OperationOutcome {
                new_count: Some(count),
                existing_count: Some(existing_ids.len()),
                ..OperationOutcome::ok(format!("Synced {} todos to the store", count))
            }
        }
        Err(e) => {
            tracing::error!("Error inserting todos: {}", e);
            OperationOutcome::failed(e)
        }
    }
}

/// Deletes every row in the store table.
pub async fn clear_store<S>(store: &S) -> OperationOutcome
where
    S: TableStore + ?Sized,
{
    tracing::info!("Clearing all todos from table store");
    match store.delete_all().await {
        Ok(()) => OperationOutcome::ok("All todos cleared from the store"),
        Err(e) => {
            tracing::error!("Clear failed: {}", e);
            OperationOutcome::failed(e)
        }
    }
}

/// Checks that the store table exists and is readable.
pub async fn check_table<S>(store: &S) -> OperationOutcome
where
    S: TableStore + ?Sized,
{
    match store.ping().await {
        Ok(()) => OperationOutcome::ok("Todos table exists and is accessible"),
        Err(e) => {
            tracing::error!("Error accessing todos table: {}", e);
            OperationOutcome::failed(e)
        }
    }
}
