//! Realtime change-notification channel.
//!
//! The store pushes row changes over a Phoenix-style websocket:
//! 1. Connect to `/realtime/v1/websocket?apikey=..&vsn=1.0.0`
//! 2. Send `phx_join` on `realtime:<channel>` with a `postgres_changes` config
//! 3. Receive `phx_reply` for the join ref (`status: ok` means subscribed)
//! 4. Receive `postgres_changes` messages, one per committed row change
//! 5. Send `heartbeat` on the `phoenix` topic every 30 seconds
//! 6. Send `phx_leave` and close the socket when the subscription closes
//!
//! Messages are JSON text frames.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::event::{ChangeEvent, ChannelMessage, SubscriptionStatus};
use super::subscription::Subscription;
use crate::error::RemoteError;

/// Interval between heartbeats on the `phoenix` topic.
pub(crate) const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// How long to wait for the join reply before reporting `TIMED_OUT`.
pub(crate) const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Realtime protocol version requested in the socket URL.
pub(crate) const PROTOCOL_VERSION: &str = "1.0.0";

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A single frame of the Phoenix channel protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// Join request subscribing to every change on `public.<table>`.
    pub fn join(topic: &str, table: &str, access_token: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": "public", "table": table }
                    ]
                },
                "access_token": access_token
            }),
            msg_ref: Some(join_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn leave(topic: &str, msg_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Maps an inbound frame to what the subscriber should see.
///
/// Frames for other topics, replies to heartbeats and presence traffic map to
/// `None`.
pub(crate) fn interpret(msg: &PhoenixMessage, topic: &str, join_ref: &str) -> Option<ChannelMessage> {
    if msg.topic != topic {
        return None;
    }

    match msg.event.as_str() {
        "phx_reply" if msg.msg_ref.as_deref() == Some(join_ref) => {
            let status = msg.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                Some(ChannelMessage::Status(SubscriptionStatus::Subscribed))
            } else {
                tracing::warn!(response = %msg.payload, "Join rejected");
                Some(ChannelMessage::Status(SubscriptionStatus::ChannelError))
            }
        }
        "phx_error" => Some(ChannelMessage::Status(SubscriptionStatus::ChannelError)),
        "phx_close" => Some(ChannelMessage::Status(SubscriptionStatus::Closed)),
        "system" => {
            let status = msg.payload.get("status").and_then(Value::as_str);
            if status == Some("error") {
                tracing::warn!(payload = %msg.payload, "Channel reported an error");
                Some(ChannelMessage::Status(SubscriptionStatus::ChannelError))
            } else {
                None
            }
        }
        "postgres_changes" => msg
            .payload
            .get("data")
            .and_then(ChangeEvent::from_change_data)
            .map(ChannelMessage::Change),
        // Older servers send the change type as the event name.
        "INSERT" | "UPDATE" | "DELETE" => {
            let mut data = msg.payload.clone();
            if let Some(obj) = data.as_object_mut() {
                obj.entry("type")
                    .or_insert_with(|| Value::String(msg.event.clone()));
            }
            ChangeEvent::from_change_data(&data).map(ChannelMessage::Change)
        }
        _ => None,
    }
}

/// Monotonic message refs, as strings.
#[derive(Debug, Default)]
struct RefCounter(u64);

impl RefCounter {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

/// What a channel needs to join.
#[derive(Debug, Clone)]
pub(crate) struct ChannelSetup {
    /// Full topic, e.g. `realtime:todos-channel`.
    pub topic: String,
    pub table: String,
    pub access_token: String,
    /// Time allowed for the join reply.
    pub join_timeout: Duration,
}

/// Connects to `url` and joins the channel described by `setup`.
///
/// Returns as soon as the socket is open; the join acknowledgment arrives
/// later as `SUBSCRIBED` on the returned subscription.
pub(crate) async fn open_channel(url: &str, setup: ChannelSetup) -> Result<Subscription, RemoteError> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

    tracing::info!(topic = %setup.topic, "Realtime socket connected");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(run_channel(ws_stream, setup, events_tx, shutdown_rx));

    Ok(Subscription::new(events_rx, shutdown_tx))
}

async fn run_channel(
    ws_stream: WsStream,
    setup: ChannelSetup,
    events: mpsc::UnboundedSender<ChannelMessage>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut sender, mut receiver) = ws_stream.split();
    let mut refs = RefCounter::default();

    let join_ref = refs.next();
    let join = PhoenixMessage::join(&setup.topic, &setup.table, &setup.access_token, &join_ref);
    if let Err(e) = send_message(&mut sender, &join).await {
        tracing::warn!(topic = %setup.topic, "Failed to send join: {}", e);
        let _ = events.send(ChannelMessage::Status(SubscriptionStatus::ChannelError));
        return;
    }

    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let join_deadline = sleep(setup.join_timeout);
    tokio::pin!(join_deadline);
    let mut joined = false;

    let final_status = loop {
        tokio::select! {
            _ = &mut shutdown => {
                let leave = PhoenixMessage::leave(&setup.topic, &refs.next());
                let _ = send_message(&mut sender, &leave).await;
                let _ = sender.send(Message::Close(None)).await;
                break SubscriptionStatus::Closed;
            }
            _ = &mut join_deadline, if !joined => {
                tracing::warn!(topic = %setup.topic, "Join was not acknowledged within {:?}", setup.join_timeout);
                let _ = sender.send(Message::Close(None)).await;
                break SubscriptionStatus::TimedOut;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = send_message(&mut sender, &PhoenixMessage::heartbeat(&refs.next())).await {
                    tracing::warn!(topic = %setup.topic, "Heartbeat failed: {}", e);
                    break SubscriptionStatus::ChannelError;
                }
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg = match PhoenixMessage::decode(text.as_str()) {
                        Ok(msg) => msg,
                        Err(e) => {
                            tracing::warn!("Ignoring undecodable frame: {}", e);
                            continue;
                        }
                    };
                    tracing::debug!(event = %msg.event, topic = %msg.topic, "Channel frame");

                    match interpret(&msg, &setup.topic, &join_ref) {
                        Some(ChannelMessage::Status(status)) if status.is_terminal() => {
                            break status;
                        }
                        Some(message) => {
                            if matches!(message, ChannelMessage::Status(SubscriptionStatus::Subscribed)) {
                                joined = true;
                            }
                            if events.send(message).is_err() {
                                // Receiver is gone; nobody is listening any more.
                                break SubscriptionStatus::Closed;
                            }
                        }
                        None => {}
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sender.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    break SubscriptionStatus::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic = %setup.topic, "Websocket error: {}", e);
                    break SubscriptionStatus::ChannelError;
                }
            }
        }
    };

    tracing::info!(topic = %setup.topic, status = %final_status, "Channel finished");
    let _ = events.send(ChannelMessage::Status(final_status));
}

async fn send_message<W>(sender: &mut W, msg: &PhoenixMessage) -> Result<(), RemoteError>
where
    W: Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    let text = msg
        .encode()
        .map_err(|e| RemoteError::Channel(e.to_string()))?;
    sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| RemoteError::Channel(e.to_string()))
}
