//! Request/response correlation and routing.

mod router;
mod service;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hazelcast_core::{Address, ClientMessage, HazelcastError, Result};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::connection::ConnectionId;

pub use router::{InvocationRouter, SmartRouter, UnisocketRouter};
pub use service::InvocationService;

/// Callback for event messages pushed on a listener registration.
pub type MessageHandler = Arc<dyn Fn(ClientMessage) + Send + Sync>;

/// Where an invocation should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// Any live connection.
    Any,
    /// The connection to the owner of the partition.
    Partition(i32),
    /// The connection to a specific member address.
    Address(Address),
    /// A specific connection, for handshakes and listener registrations.
    Connection(ConnectionId),
}

/// A request waiting to be sent.
pub struct Invocation {
    request: ClientMessage,
    target: InvocationTarget,
    timeout: Option<Duration>,
    retryable: bool,
    event_handler: Option<MessageHandler>,
}

impl Invocation {
    /// Creates an invocation that may use any connection.
    pub fn new(request: ClientMessage) -> Self {
        Self {
            request,
            target: InvocationTarget::Any,
            timeout: None,
            retryable: false,
            event_handler: None,
        }
    }

    /// Creates an invocation routed to a partition owner.
    pub fn on_partition(request: ClientMessage, partition_id: i32) -> Self {
        Self::new(request).with_target(InvocationTarget::Partition(partition_id))
    }

    /// Creates an invocation routed to a member address.
    pub fn to_address(request: ClientMessage, address: Address) -> Self {
        Self::new(request).with_target(InvocationTarget::Address(address))
    }

    /// Creates an invocation bound to one connection.
    pub fn on_connection(request: ClientMessage, connection: ConnectionId) -> Self {
        Self::new(request).with_target(InvocationTarget::Connection(connection))
    }

    /// Sets the routing target.
    pub fn with_target(mut self, target: InvocationTarget) -> Self {
        self.target = target;
        self
    }

    /// Overrides the configured invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the request as safe to resend after its connection drops.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Registers a handler for event messages carrying this invocation's
    /// correlation id. The handler stays registered after the response
    /// arrives, until [`InvocationService::remove_event_handler`].
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ClientMessage) + Send + Sync + 'static,
    {
        self.event_handler = Some(Arc::new(handler));
        self
    }

    /// Returns the request message.
    pub fn request(&self) -> &ClientMessage {
        &self.request
    }

    /// Returns the routing target.
    pub fn target(&self) -> &InvocationTarget {
        &self.target
    }

    /// Returns whether the request may be resent.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("message_type", &self.request.message_type())
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .field("retryable", &self.retryable)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// The pending result of a sent invocation.
///
/// Timing out or cancelling only stops the wait; the invocation stays
/// registered until its response arrives or its connection closes.
#[derive(Debug)]
pub struct InvocationFuture {
    correlation_id: i64,
    timeout: Duration,
    retryable: bool,
    receiver: oneshot::Receiver<Result<ClientMessage>>,
}

impl InvocationFuture {
    /// Returns the correlation id assigned to the request.
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Returns whether the request was marked retryable.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Waits for the response, bounded by the invocation timeout.
    pub async fn wait(self) -> Result<ClientMessage> {
        self.wait_with_cancel(&CancellationToken::new()).await
    }

    /// Waits for the response until the timeout elapses or `cancel` fires.
    pub async fn wait_with_cancel(self, cancel: &CancellationToken) -> Result<ClientMessage> {
        let correlation_id = self.correlation_id;
        let timeout = self.timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HazelcastError::Cancelled(format!(
                "invocation {} cancelled",
                correlation_id
            ))),
            result = tokio::time::timeout(timeout, self.receiver) => match result {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(HazelcastError::ClientNotActive(format!(
                    "invocation {} was abandoned",
                    correlation_id
                ))),
                Err(_) => Err(HazelcastError::Timeout(format!(
                    "invocation {} timed out after {:?}",
                    correlation_id, timeout
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn future(timeout: Duration) -> (oneshot::Sender<Result<ClientMessage>>, InvocationFuture) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            InvocationFuture {
                correlation_id: 7,
                timeout,
                retryable: false,
                receiver: rx,
            },
        )
    }

    #[test]
    fn test_invocation_builders() {
        let request = ClientMessage::create_for_encode_any_partition(1);
        let invocation = Invocation::on_partition(request, 3)
            .retryable(true)
            .with_timeout(Duration::from_secs(1));
        assert_eq!(invocation.target(), &InvocationTarget::Partition(3));
        assert!(invocation.is_retryable());
        assert!(format!("{:?}", invocation).contains("Partition(3)"));
    }

    #[tokio::test]
    async fn test_wait_resolves() {
        let (tx, future) = future(Duration::from_secs(1));
        tx.send(Ok(ClientMessage::create_for_response(2, 7))).unwrap();
        let response = future.wait().await.unwrap();
        assert_eq!(response.correlation_id(), Some(7));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (_tx, future) = future(Duration::from_millis(10));
        assert!(matches!(future.wait().await, Err(HazelcastError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let (_tx, future) = future(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            future.wait_with_cancel(&cancel).await,
            Err(HazelcastError::Cancelled(_))
        ));
    }
}
