//! todosync core library
//!
//! Keeps a todo list consistent across a REST collection and a hosted table
//! store with realtime change notifications.

pub mod error;
pub mod live;
pub mod maintenance;
pub mod models;
pub mod reconcile;
pub mod rest;
pub mod store;

#[cfg(test)]
pub(crate) mod fakes;

pub use error::RemoteError;
pub use live::{ConnectionState, LiveTodos};
pub use maintenance::{check_table, clear_store, sync_to_store, OperationOutcome};
pub use models::{NewTodo, Todo, TodoPatch};
pub use reconcile::{
    reconcile, BackfillOutcome, Reconciliation, WorkingSetSource, INITIAL_LOAD_LIMIT,
};
pub use rest::{RestClient, TodoCollection, DEFAULT_COLLECTION_URL};
pub use store::{
    ChangeEvent, ChangeKind, ChannelMessage, StoreCredentials, Subscription, SubscriptionStatus,
    SupabaseStore, TableStore,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
