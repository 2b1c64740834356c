//! Single-task event dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use hazelcast_core::{HazelcastError, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Event, EventHandler, EventKind, SubscriptionId};

/// Capacity of the control mailbox.
const MAILBOX_CAPACITY: usize = 64;

enum Command {
    Subscribe {
        kind: EventKind,
        id: SubscriptionId,
        handler: EventHandler,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        id: SubscriptionId,
        ack: oneshot::Sender<bool>,
    },
    Publish(Event),
    Stop,
}

/// Publish/subscribe bus owned by one dispatch task.
///
/// Subscribe, unsubscribe and publish requests travel through one mailbox and
/// are applied in the order they were accepted, so the subscription table is
/// never mutated concurrently. `subscribe` resolves only once the dispatch
/// task has recorded the handler, hence any event published afterwards
/// reaches it.
#[derive(Debug)]
pub struct EventDispatcher {
    mailbox: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl EventDispatcher {
    /// Creates the dispatcher and spawns its dispatch task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let shutdown = CancellationToken::new();
        tokio::spawn(run(inbox, shutdown.clone()));
        Self { mailbox, shutdown }
    }

    /// Registers `handler` for events of `kind`.
    pub async fn subscribe<F>(&self, kind: EventKind, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let (ack, acked) = oneshot::channel();
        self.mailbox
            .send(Command::Subscribe {
                kind,
                id,
                handler: Arc::new(handler),
                ack,
            })
            .await
            .map_err(|_| stopped())?;
        acked.await.map_err(|_| stopped())?;
        debug!(subscription = %id, ?kind, "subscribed");
        Ok(id)
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let (ack, acked) = oneshot::channel();
        self.mailbox
            .send(Command::Unsubscribe { id, ack })
            .await
            .map_err(|_| stopped())?;
        acked.await.map_err(|_| stopped())
    }

    /// Publishes an event without waiting for delivery.
    ///
    /// When the mailbox is full the event is handed to a short-lived task that
    /// waits for room, so the caller never blocks.
    pub fn publish(&self, event: Event) {
        match self.mailbox.try_send(Command::Publish(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                let mailbox = self.mailbox.clone();
                tokio::spawn(async move {
                    let _ = mailbox.send(command).await;
                });
            }
            Err(TrySendError::Closed(Command::Publish(event))) => {
                trace!(kind = ?event.kind(), "dispatcher stopped, event dropped");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Stops the dispatch task. Pending and later requests are dropped.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Stops the dispatch task after every request accepted so far has
    /// been processed.
    pub async fn close(&self) {
        if self.mailbox.send(Command::Stop).await.is_err() {
            return;
        }
        self.shutdown.cancelled().await;
    }

    /// Returns true once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Subscribe { kind, id, .. } => f
                .debug_struct("Subscribe")
                .field("kind", kind)
                .field("id", id)
                .finish(),
            Command::Unsubscribe { id, .. } => {
                f.debug_struct("Unsubscribe").field("id", id).finish()
            }
            Command::Publish(event) => f.debug_tuple("Publish").field(&event.kind()).finish(),
            Command::Stop => f.write_str("Stop"),
        }
    }
}

fn stopped() -> HazelcastError {
    HazelcastError::ClientNotActive("event dispatcher is stopped".to_string())
}

async fn run(mut inbox: mpsc::Receiver<Command>, shutdown: CancellationToken) {
    let mut table: HashMap<EventKind, HashMap<SubscriptionId, EventHandler>> = HashMap::new();

    loop {
        let command = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = inbox.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Subscribe {
                kind,
                id,
                handler,
                ack,
            } => {
                table.entry(kind).or_default().insert(id, handler);
                let _ = ack.send(());
            }
            Command::Unsubscribe { id, ack } => {
                let removed = table
                    .values_mut()
                    .any(|handlers| handlers.remove(&id).is_some());
                let _ = ack.send(removed);
            }
            Command::Stop => {
                shutdown.cancel();
                break;
            }
            Command::Publish(event) => {
                let kind = event.kind();
                let handlers = match table.get(&kind) {
                    Some(handlers) if !handlers.is_empty() => handlers,
                    _ => {
                        trace!(?kind, "no subscribers");
                        continue;
                    }
                };
                for handler in handlers.values() {
                    let handler = Arc::clone(handler);
                    let event = event.clone();
                    tokio::spawn(async move { handler(event) });
                }
            }
        }
    }

    debug!("event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn forwarding(tx: mpsc::UnboundedSender<Event>) -> impl Fn(Event) + Send + Sync + 'static {
        move |event| {
            let _ = tx.send(event);
        }
    }

    #[tokio::test]
    async fn test_publish_after_subscribe_is_delivered() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::Connected, forwarding(tx))
            .await
            .unwrap();

        dispatcher.publish(Event::Connected);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::Connected));
    }

    #[tokio::test]
    async fn test_events_only_reach_matching_kind() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::Disconnected, forwarding(tx))
            .await
            .unwrap();

        dispatcher.publish(Event::Connected);
        dispatcher.publish(Event::Disconnected);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::Disconnected));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_every_handler_is_invoked() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            dispatcher
                .subscribe(EventKind::LifecycleStateChanged, move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        dispatcher.publish(Event::LifecycleStateChanged(LifecycleState::Started));

        tokio::time::timeout(Duration::from_secs(1), async {
            while calls.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = dispatcher
            .subscribe(EventKind::Connected, forwarding(tx))
            .await
            .unwrap();

        assert!(dispatcher.unsubscribe(id).await.unwrap());
        assert!(!dispatcher.unsubscribe(id).await.unwrap());

        dispatcher.publish(Event::Connected);
        // A round trip through the mailbox guarantees the publish was processed.
        dispatcher.unsubscribe(SubscriptionId::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_burst_beyond_mailbox_capacity() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::PartitionsUpdated, forwarding(tx))
            .await
            .unwrap();

        let total = MAILBOX_CAPACITY * 3;
        for version in 0..total {
            dispatcher.publish(Event::PartitionsUpdated {
                version: version as i32,
            });
        }

        let mut received = 0;
        while received < total {
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received += 1;
        }
    }

    #[tokio::test]
    async fn test_close_delivers_earlier_events() {
        let dispatcher = EventDispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::LifecycleStateChanged, forwarding(tx))
            .await
            .unwrap();

        dispatcher.publish(Event::LifecycleStateChanged(LifecycleState::Shutdown));
        dispatcher.close().await;
        assert!(dispatcher.is_stopped());

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            Event::LifecycleStateChanged(LifecycleState::Shutdown)
        ));

        // Closing twice is harmless.
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_subscribe_after_stop_fails() {
        let dispatcher = EventDispatcher::new();
        dispatcher.stop();
        assert!(dispatcher.is_stopped());

        let result = dispatcher.subscribe(EventKind::Connected, |_| {}).await;
        assert!(matches!(result, Err(HazelcastError::ClientNotActive(_))));

        // Publishing after stop is silently ignored.
        dispatcher.publish(Event::Connected);
    }
}
