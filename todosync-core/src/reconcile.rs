//! Startup reconciliation between the REST collection and the table store.
//!
//! # Algorithm
//!
//! 1. Fetch the REST collection and keep the first `limit` items. A failure
//!    here is terminal: there is no fallback source.
//! 2. Read up to `limit` rows from the table store.
//!    - read fails: keep the REST items, the store is unreachable
//!    - read returns rows: the store wins, REST items are discarded
//!    - read returns nothing: keep the REST items and backfill the store
//! 3. The store counts as reachable when the read succeeded, whatever the
//!    backfill did.
//!
//! Backfill is best effort and never retried.

use crate::error::RemoteError;
use crate::models::Todo;
use crate::rest::TodoCollection;
use crate::store::TableStore;

/// Items loaded on activation.
pub const INITIAL_LOAD_LIMIT: usize = 10;

/// Where the working set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingSetSource {
    Rest,
    Store,
}

/// What happened to the backfill step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    NotAttempted,
    /// Number of rows the store reported back.
    Inserted(usize),
    Failed(String),
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub todos: Vec<Todo>,
    pub source: WorkingSetSource,
    pub store_reachable: bool,
    pub backfill: BackfillOutcome,
}

/// Runs one reconciliation pass.
pub async fn reconcile<C, S>(
    collection: &C,
    store: &S,
    limit: usize,
) -> Result<Reconciliation, RemoteError>
where
    C: TodoCollection + ?Sized,
    S: TableStore + ?Sized,
{
    let mut rest_todos = collection.list().await.map_err(|e| {
        tracing::error!("Error fetching todos: {}", e);
        e
    })?;
    rest_todos.truncate(limit);

    let store_todos = match store.select_all(limit).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Failed to fetch from table store, using REST data: {}", e);
            return Ok(Reconciliation {
                todos: rest_todos,
                source: WorkingSetSource::Rest,
                store_reachable: false,
                backfill: BackfillOutcome::NotAttempted,
            });
        }
    };

    if !store_todos.is_empty() {
        tracing::info!("Using data from table store: {} todos", store_todos.len());
        return Ok(Reconciliation {
            todos: store_todos,
            source: WorkingSetSource::Store,
            store_reachable: true,
            backfill: BackfillOutcome::NotAttempted,
        });
    }

    tracing::info!("No data found in table store, using REST data");
    let backfill = backfill(store, &rest_todos).await;

    Ok(Reconciliation {
        todos: rest_todos,
        source: WorkingSetSource::Rest,
        store_reachable: true,
        backfill,
    })
}

async fn backfill<S>(store: &S, todos: &[Todo]) -> BackfillOutcome
where
    S: TableStore + ?Sized,
{
    if todos.is_empty() {
        return BackfillOutcome::NotAttempted;
    }

    tracing::info!("Syncing {} todos to table store", todos.len());
    match store.insert(todos).await {
        Ok(inserted) => BackfillOutcome::Inserted(inserted.len()),
        Err(e) => {
            tracing::warn!("Failed to sync with table store: {}", e);
            BackfillOutcome::Failed(e.to_string())
        }
    }
}
