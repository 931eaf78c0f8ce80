//! Live sync controller.
//!
//! Owns the local todo list for the lifetime of a view. Nothing else writes
//! to it: remote change events and local mutations both go through here.
//!
//! ## Lifecycle
//!
//! 1. `load` runs the reconciler and seeds the list
//! 2. `mount` opens the change subscription (`Connecting`)
//! 3. The `SUBSCRIBED` acknowledgment moves the connection to `Connected`
//! 4. Each change is applied idempotently by id
//! 5. `unmount` (or dropping the controller) closes the subscription
//!
//! ## Mutations
//!
//! Every mutation hits the REST collection first, then the store when it is
//! connected, then updates the local list. The local update happens whether
//! or not the store call succeeded and is never rolled back.

use std::fmt;

use crate::error::RemoteError;
use crate::models::{Todo, TodoPatch};
use crate::reconcile::{reconcile, Reconciliation, INITIAL_LOAD_LIMIT};
use crate::rest::TodoCollection;
use crate::store::{ChangeEvent, ChannelMessage, Subscription, SubscriptionStatus, TableStore};

/// State of the change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Local todo list kept in step with the table store.
pub struct LiveTodos<'a, C: ?Sized, S: ?Sized> {
    collection: &'a C,
    store: &'a S,
    limit: usize,
    todos: Vec<Todo>,
    loading: bool,
    error: Option<RemoteError>,
    store_reachable: bool,
    connection: ConnectionState,
    subscription: Option<Subscription>,
}

impl<'a, C, S> LiveTodos<'a, C, S>
where
    C: TodoCollection + ?Sized,
    S: TableStore + ?Sized,
{
    pub fn new(collection: &'a C, store: &'a S) -> Self {
        Self {
            collection,
            store,
            limit: INITIAL_LOAD_LIMIT,
            todos: Vec::new(),
            loading: true,
            error: None,
            store_reachable: false,
            connection: ConnectionState::Disconnected,
            subscription: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: i64) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last recorded failure.
    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// True when store mutations should be mirrored: either the initial read
    /// succeeded or the channel acknowledged the subscription.
    pub fn store_connected(&self) -> bool {
        self.store_reachable || self.connection == ConnectionState::Connected
    }

    /// Seeds the list from the reconciler.
    ///
    /// A REST failure is recorded and returned; the list is left empty.
    pub async fn load(&mut self) -> Result<Reconciliation, RemoteError> {
        self.loading = true;
        let result = reconcile(self.collection, self.store, self.limit).await;
        self.loading = false;

        match result {
            Ok(reconciliation) => {
                self.todos = dedup_by_id(reconciliation.todos.clone());
                self.store_reachable = reconciliation.store_reachable;
                self.error = None;
                Ok(reconciliation)
            }
            Err(e) => {
                self.todos.clear();
                self.store_reachable = false;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Opens the change subscription. Does nothing if one is already open.
    pub async fn mount(&mut self) {
        if self.subscription.is_some() {
            return;
        }

        self.connection = ConnectionState::Connecting;
        match self.store.subscribe().await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
            }
            Err(e) => {
                tracing::warn!("Failed to open change subscription: {}", e);
                self.connection = ConnectionState::Disconnected;
            }
        }
    }

    /// Closes the subscription. Safe to call any number of times.
    pub fn unmount(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        self.connection = ConnectionState::Disconnected;
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next channel message.
    ///
    /// Returns `None` when nothing is mounted or the channel has ended; in
    /// the latter case the subscription is released.
    pub async fn next_message(&mut self) -> Option<ChannelMessage> {
        let message = self.subscription.as_mut()?.next().await;
        if message.is_none() {
            tracing::info!("Change subscription ended");
            self.unmount();
        }
        message
    }

    pub fn apply_message(&mut self, message: ChannelMessage) {
        match message {
            ChannelMessage::Status(status) => self.apply_status(status),
            ChannelMessage::Change(event) => self.apply_change(event),
        }
    }

    /// Tracks the channel lifecycle.
    ///
    /// Dropping to `Disconnected` does not stop store mirroring: mutations are
    /// still sent to the store while the initial read succeeded (see
    /// [`store_connected`](Self::store_connected)).
    pub fn apply_status(&mut self, status: SubscriptionStatus) {
        tracing::info!(%status, "Subscription status");
        self.connection = match status {
            SubscriptionStatus::Subscribed => ConnectionState::Connected,
            SubscriptionStatus::TimedOut
            | SubscriptionStatus::Closed
            | SubscriptionStatus::ChannelError => ConnectionState::Disconnected,
        };
    }

    /// Applies one change. Safe against duplicate and out-of-band delivery:
    /// inserts upsert by id, updates and deletes of unknown ids are ignored.
    pub fn apply_change(&mut self, event: ChangeEvent) {
        tracing::debug!(kind = %event.kind(), id = event.id(), "Change received");
        match event {
            ChangeEvent::Insert(todo) => self.upsert(todo),
            ChangeEvent::Update(todo) => {
                if let Some(existing) = self.todos.iter_mut().find(|t| t.id == todo.id) {
                    *existing = todo;
                }
            }
            ChangeEvent::Delete { id } => self.todos.retain(|t| t.id != id),
        }
    }

    /// Creates an item through REST and mirrors it to the store.
    pub async fn add_todo(&mut self, title: &str) -> Result<Todo, RemoteError> {
        let todo = self
            .collection
            .create(title)
            .await
            .map_err(|e| self.record_error(e))?;

        if self.store_connected() {
            let row = [todo.clone()];
            if let Err(e) = self.store.insert(&row).await {
                tracing::warn!(id = todo.id, "Store insert failed: {}", e);
            }
        }

        self.upsert(todo.clone());
        Ok(todo)
    }

    /// Sets `completed` through REST and mirrors it to the store.
    pub async fn toggle_todo(&mut self, id: i64, completed: bool) -> Result<Todo, RemoteError> {
        let patch = TodoPatch::completed(completed);
        let updated = self
            .collection
            .update(id, &patch)
            .await
            .map_err(|e| self.record_error(e))?;

        if self.store_connected() {
            if let Err(e) = self.store.update(id, &patch).await {
                tracing::warn!(id, "Store update failed: {}", e);
            }
        }

        if let Some(todo) = self.todos.iter_mut().find(|t| t.id == id) {
            todo.completed = completed;
        }
        Ok(updated)
    }

    /// Deletes through REST and mirrors it to the store.
    pub async fn remove_todo(&mut self, id: i64) -> Result<(), RemoteError> {
        self.collection
            .delete(id)
            .await
            .map_err(|e| self.record_error(e))?;

        if self.store_connected() {
            if let Err(e) = self.store.delete(id).await {
                tracing::warn!(id, "Store delete failed: {}", e);
            }
        }

        self.todos.retain(|t| t.id != id);
        Ok(())
    }

    fn upsert(&mut self, todo: Todo) {
        match self.todos.iter_mut().find(|t| t.id == todo.id) {
            Some(existing) => *existing = todo,
            None => self.todos.push(todo),
        }
    }

    fn record_error(&mut self, e: RemoteError) -> RemoteError {
        tracing::error!("{}", e);
        self.error = Some(e.clone());
        e
    }
}

impl<C: ?Sized, S: ?Sized> Drop for LiveTodos<'_, C, S> {
    fn drop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}

/// Keeps the first occurrence of each id.
fn dedup_by_id(todos: Vec<Todo>) -> Vec<Todo> {
    let mut seen = std::collections::HashSet::new();
    todos.into_iter().filter(|t| seen.insert(t.id)).collect()
}
