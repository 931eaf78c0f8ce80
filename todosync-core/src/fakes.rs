//! In-memory stand-ins for the remote sources, used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use crate::error::RemoteError;
use crate::models::{Todo, TodoPatch};
use crate::rest::TodoCollection;
use crate::store::{ChannelMessage, Subscription, TableStore};

fn unavailable() -> RemoteError {
    RemoteError::Unavailable("connection refused".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestCall {
    List,
    Get(i64),
    Create(String),
    Update(i64, TodoPatch),
    Delete(i64),
}

#[derive(Default)]
pub struct FakeCollection {
    todos: Mutex<Vec<Todo>>,
    calls: Mutex<Vec<RestCall>>,
    fail: bool,
}

impl FakeCollection {
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        Self {
            todos: Mutex::new(todos),
            ..Self::default()
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<RestCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RestCall) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TodoCollection for FakeCollection {
    async fn list(&self) -> Result<Vec<Todo>, RemoteError> {
        self.record(RestCall::List)?;
        Ok(self.todos.lock().unwrap().clone())
    }

    async fn get(&self, id: i64) -> Result<Todo, RemoteError> {
        self.record(RestCall::Get(id))?;
        self.todos
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(RemoteError::Request {
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn create(&self, title: &str) -> Result<Todo, RemoteError> {
        self.record(RestCall::Create(title.to_string()))?;
        let mut todos = self.todos.lock().unwrap();
        // Mirrors the demo API, which hands out ids after its 200 fixtures.
        let id = 201 + todos.iter().filter(|t| t.id > 200).count() as i64;
        let todo = Todo::new(id, title);
        todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<Todo, RemoteError> {
        self.record(RestCall::Update(id, patch.clone()))?;
        let mut todos = self.todos.lock().unwrap();
        match todos.iter_mut().find(|t| t.id == id) {
            Some(todo) => {
                todo.apply(patch);
                Ok(todo.clone())
            }
            None => {
                let mut todo = Todo::new(id, "");
                todo.apply(patch);
                Ok(todo)
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<(), RemoteError> {
        self.record(RestCall::Delete(id))?;
        self.todos.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    SelectAll(usize),
    SelectIds,
    Insert(Vec<Todo>),
    Update(i64, TodoPatch),
    Delete(i64),
    DeleteAll,
    Ping,
    Subscribe,
}

type ChannelEnds = (mpsc::UnboundedSender<ChannelMessage>, oneshot::Receiver<()>);

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<Todo>>,
    calls: Mutex<Vec<StoreCall>>,
    channel: Mutex<Option<ChannelEnds>>,
    fail_select: bool,
    fail_insert: bool,
    fail_mutations: bool,
    fail_subscribe: bool,
}

impl FakeStore {
    pub fn with_rows(rows: Vec<Todo>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn failing_select(mut self) -> Self {
        self.fail_select = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// Update, delete and delete-all fail.
    pub fn failing_mutations(mut self) -> Self {
        self.fail_mutations = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserts(&self) -> Vec<Vec<Todo>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Insert(items) => Some(items),
                _ => None,
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<Todo> {
        self.rows.lock().unwrap().clone()
    }

    /// Delivers a message on the open subscription.
    pub fn push(&self, message: ChannelMessage) {
        let channel = self.channel.lock().unwrap();
        let (tx, _) = channel.as_ref().expect("no open subscription");
        tx.send(message).expect("subscription receiver dropped");
    }

    /// True once the subscriber closed or dropped its subscription.
    pub fn shutdown_requested(&self) -> bool {
        let mut channel = self.channel.lock().unwrap();
        match channel.as_mut() {
            Some((_, shutdown)) => !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)),
            None => false,
        }
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TableStore for FakeStore {
    async fn select_all(&self, limit: usize) -> Result<Vec<Todo>, RemoteError> {
        self.record(StoreCall::SelectAll(limit));
        if self.fail_select {
            return Err(unavailable());
        }
        Ok(self.rows.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn select_ids(&self) -> Result<Vec<i64>, RemoteError> {
        self.record(StoreCall::SelectIds);
        if self.fail_select {
            return Err(unavailable());
        }
        Ok(self.rows.lock().unwrap().iter().map(|t| t.id).collect())
    }

    async fn insert(&self, items: &[Todo]) -> Result<Vec<Todo>, RemoteError> {
        self.record(StoreCall::Insert(items.to_vec()));
        if self.fail_insert {
            return Err(RemoteError::Request {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        self.rows.lock().unwrap().extend_from_slice(items);
        Ok(items.to_vec())
    }

    async fn update(&self, id: i64, patch: &TodoPatch) -> Result<(), RemoteError> {
        self.record(StoreCall::Update(id, patch.clone()));
        if self.fail_mutations {
            return Err(unavailable());
        }
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|t| t.id == id) {
            row.apply(patch);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RemoteError> {
        self.record(StoreCall::Delete(id));
        if self.fail_mutations {
            return Err(unavailable());
        }
        self.rows.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), RemoteError> {
        self.record(StoreCall::DeleteAll);
        if self.fail_mutations {
            return Err(unavailable());
        }
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.record(StoreCall::Ping);
        if self.fail_select {
            return Err(RemoteError::Request {
                status: 404,
                message: "relation \"public.todos\" does not exist".to_string(),
            });
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, RemoteError> {
        self.record(StoreCall::Subscribe);
        if self.fail_subscribe {
            return Err(unavailable());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.channel.lock().unwrap() = Some((tx, shutdown_rx));
        Ok(Subscription::new(rx, shutdown_tx))
    }
}
