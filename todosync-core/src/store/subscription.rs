//! Handle to an open change-notification channel.

use tokio::sync::{mpsc, oneshot};

use super::event::ChannelMessage;

/// An open subscription.
///
/// Messages are produced by a background task and read with [`next`].
/// [`close`] stops the task; it is idempotent and also runs on drop, so a
/// channel never outlives its owner.
///
/// [`next`]: Subscription::next
/// [`close`]: Subscription::close
#[derive(Debug)]
pub struct Subscription {
    messages: mpsc::UnboundedReceiver<ChannelMessage>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Wraps the receiving end of a channel task. Sending on (or dropping)
    /// the task's `shutdown` receiver's peer tells it to leave and disconnect.
    pub fn new(
        messages: mpsc::UnboundedReceiver<ChannelMessage>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            messages,
            shutdown: Some(shutdown),
        }
    }

    /// Waits for the next message. Returns `None` once the channel task has
    /// finished and everything buffered was read.
    pub async fn next(&mut self) -> Option<ChannelMessage> {
        self.messages.recv().await
    }

    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            self.messages.close();
            tracing::info!("Subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SubscriptionStatus;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let mut subscription = Subscription::new(rx, shutdown_tx);

        assert!(!subscription.is_closed());
        subscription.close();
        subscription.close();
        assert!(subscription.is_closed());
        assert!(shutdown_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_drop_signals_shutdown() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        drop(Subscription::new(rx, shutdown_tx));
        assert!(shutdown_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_next_returns_buffered_messages() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        let mut subscription = Subscription::new(rx, shutdown_tx);

        tx.send(ChannelMessage::Status(SubscriptionStatus::Subscribed))
            .unwrap();
        drop(tx);

        assert_eq!(
            subscription.next().await,
            Some(ChannelMessage::Status(SubscriptionStatus::Subscribed))
        );
        assert_eq!(subscription.next().await, None);
    }
}
