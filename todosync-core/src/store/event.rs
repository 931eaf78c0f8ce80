//! Messages delivered over a table subscription.

use serde_json::Value;
use std::fmt;

use crate::models::Todo;

/// Kind of row change reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A committed row change.
///
/// Deletes only carry the primary key: the store does not ship the old row
/// unless the table uses full replica identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Todo),
    Update(Todo),
    Delete { id: i64 },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ChangeEvent::Insert(todo) | ChangeEvent::Update(todo) => todo.id,
            ChangeEvent::Delete { id } => *id,
        }
    }

    /// Builds an event from a `postgres_changes` data object:
    /// `{"type": "INSERT", "record": {...}, "old_record": {...}, ...}`.
    ///
    /// Returns `None` for unknown types and for records missing any field.
    pub fn from_change_data(data: &Value) -> Option<Self> {
        let kind = data
            .get("type")
            .or_else(|| data.get("eventType"))
            .and_then(Value::as_str)
            .and_then(ChangeKind::parse)?;

        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let record = data.get("record").or_else(|| data.get("new"))?;
                let todo = match serde_json::from_value::<Todo>(record.clone()) {
                    Ok(todo) => todo,
                    Err(e) => {
                        tracing::warn!(%kind, "Dropping incomplete record: {}", e);
                        return None;
                    }
                };
                Some(match kind {
                    ChangeKind::Insert => ChangeEvent::Insert(todo),
                    _ => ChangeEvent::Update(todo),
                })
            }
            ChangeKind::Delete => {
                let old = data.get("old_record").or_else(|| data.get("old"))?;
                let id = old.get("id").and_then(Value::as_i64)?;
                Some(ChangeEvent::Delete { id })
            }
        }
    }
}

/// Lifecycle of a subscription as reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// The server acknowledged the join.
    Subscribed,
    /// The join was not acknowledged in time.
    TimedOut,
    Closed,
    ChannelError,
}

impl SubscriptionStatus {
    /// True for statuses after which no more changes will arrive.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubscriptionStatus::Subscribed)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Subscribed => write!(f, "SUBSCRIBED"),
            SubscriptionStatus::TimedOut => write!(f, "TIMED_OUT"),
            SubscriptionStatus::Closed => write!(f, "CLOSED"),
            SubscriptionStatus::ChannelError => write!(f, "CHANNEL_ERROR"),
        }
    }
}

/// Anything a subscription can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Status(SubscriptionStatus),
    Change(ChangeEvent),
}
