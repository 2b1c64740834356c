//! Single connection to a Hazelcast cluster member.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hazelcast_core::protocol::constants::CLIENT_PROTOCOL_HEADER;
use hazelcast_core::protocol::{ClientMessage, ClientMessageCodec};
use hazelcast_core::{Address, HazelcastError, Result};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::event::{Event, EventDispatcher};
use crate::invocation::InvocationService;

/// Capacity of the per-connection outbound queue.
const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Messages larger than this on the wire are split into fragments.
const FRAGMENT_THRESHOLD: usize = 4 * 1024 * 1024;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw ID value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Socket is up; authentication has not completed.
    Connecting = 0,
    /// Authenticated and registered.
    Open = 1,
    /// Closed; the read and write tasks are stopping.
    Closed = 2,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// A multiplexed connection to a single Hazelcast cluster member.
///
/// One read task decodes complete (reassembled) messages and hands them to
/// the invocation service; one write task drains the outbound queue onto the
/// socket in enqueue order. The connection holds the invocation service only
/// weakly so the service's routers may keep connections alive without a cycle.
pub struct Connection {
    id: ConnectionId,
    address: Address,
    member_uuid: OnceLock<Uuid>,
    status: AtomicU8,
    created_at: Instant,
    last_read_at: Mutex<Instant>,
    last_write_at: Mutex<Instant>,
    outbound: mpsc::Sender<ClientMessage>,
    shutdown: CancellationToken,
    fragment_ids: AtomicI64,
    close_error: Mutex<Option<Arc<HazelcastError>>>,
    invocations: Weak<InvocationService>,
    dispatcher: Arc<EventDispatcher>,
}

impl Connection {
    /// Opens a TCP connection to `address`, writes the protocol header and
    /// starts the read and write tasks.
    ///
    /// The returned connection is in [`ConnectionStatus::Connecting`] until
    /// [`Connection::mark_open`] is called after authentication.
    pub async fn connect(
        address: &Address,
        timeout: Duration,
        invocations: Weak<InvocationService>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Result<Arc<Self>> {
        let socket_addr = address.resolve().await?;
        let stream = tokio::time::timeout(timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| {
                HazelcastError::Connection(format!(
                    "connecting to {} timed out after {:?}",
                    address, timeout
                ))
            })?
            .map_err(|e| {
                HazelcastError::Connection(format!("failed to connect to {}: {}", address, e))
            })?;

        stream.set_nodelay(true).map_err(|e| {
            HazelcastError::Connection(format!("failed to set TCP_NODELAY: {}", e))
        })?;

        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(CLIENT_PROTOCOL_HEADER)
            .await
            .map_err(|e| {
                HazelcastError::Connection(format!(
                    "failed to write protocol header to {}: {}",
                    address, e
                ))
            })?;

        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let now = Instant::now();
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            address: address.clone(),
            member_uuid: OnceLock::new(),
            status: AtomicU8::new(ConnectionStatus::Connecting as u8),
            created_at: now,
            last_read_at: Mutex::new(now),
            last_write_at: Mutex::new(now),
            outbound,
            shutdown: CancellationToken::new(),
            fragment_ids: AtomicI64::new(0),
            close_error: Mutex::new(None),
            invocations,
            dispatcher,
        });

        tokio::spawn(read_loop(Arc::clone(&connection), read_half));
        tokio::spawn(write_loop(Arc::clone(&connection), queue, write_half));

        debug!(id = %connection.id, address = %address, "established connection");
        Ok(connection)
    }

    /// Returns the connection's unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address this connection was opened to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the member UUID learned during authentication.
    pub fn member_uuid(&self) -> Option<Uuid> {
        self.member_uuid.get().copied()
    }

    /// Records the member UUID. Later calls are ignored.
    pub fn set_member_uuid(&self, uuid: Uuid) {
        let _ = self.member_uuid.set(uuid);
    }

    /// Returns the current status.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Returns true until the connection is closed.
    pub fn is_alive(&self) -> bool {
        self.status() != ConnectionStatus::Closed
    }

    /// Moves a connecting connection to [`ConnectionStatus::Open`].
    ///
    /// Returns false if the connection was closed in the meantime.
    pub fn mark_open(&self) -> bool {
        self.status
            .compare_exchange(
                ConnectionStatus::Connecting as u8,
                ConnectionStatus::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns when this connection was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns when a message was last read from this connection.
    pub fn last_read_at(&self) -> Instant {
        *self.last_read_at.lock()
    }

    /// Returns when a message was last written to this connection.
    pub fn last_write_at(&self) -> Instant {
        *self.last_write_at.lock()
    }

    /// Returns the error the connection was closed with, if any.
    pub fn close_error(&self) -> Option<Arc<HazelcastError>> {
        self.close_error.lock().clone()
    }

    /// Queues a message for the write task.
    ///
    /// Waits for room when the outbound queue is full.
    pub async fn write(&self, message: ClientMessage) -> Result<()> {
        if !self.is_alive() {
            return Err(self.closed_error());
        }
        self.outbound
            .send(message)
            .await
            .map_err(|_| self.closed_error())
    }

    /// Closes the connection. Returns false if it was already closed.
    ///
    /// Every invocation pending on this connection fails with
    /// `TargetDisconnected`, and `ConnectionClosed` is published once.
    pub fn close(self: &Arc<Self>, error: Option<HazelcastError>) -> bool {
        let previous = self
            .status
            .swap(ConnectionStatus::Closed as u8, Ordering::AcqRel);
        if previous == ConnectionStatus::Closed as u8 {
            return false;
        }
        self.shutdown.cancel();

        let error = error.map(Arc::new);
        *self.close_error.lock() = error.clone();
        match &error {
            Some(err) => info!(id = %self.id, address = %self.address, error = %err, "connection closed"),
            None => info!(id = %self.id, address = %self.address, "connection closed"),
        }

        if let Some(invocations) = self.invocations.upgrade() {
            let reason = match &error {
                Some(err) => format!("connection {} to {} closed: {}", self.id, self.address, err),
                None => format!("connection {} to {} closed", self.id, self.address),
            };
            invocations.fail_connection(self.id, &reason);
        }

        self.dispatcher.publish(Event::ConnectionClosed {
            connection: Arc::clone(self),
            error,
        });
        true
    }

    fn closed_error(&self) -> HazelcastError {
        HazelcastError::TargetDisconnected(format!(
            "connection {} to {} is closed",
            self.id, self.address
        ))
    }

    fn next_fragment_id(&self) -> i64 {
        self.fragment_ids.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("member_uuid", &self.member_uuid())
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection[{}, {}]", self.id, self.address)
    }
}

async fn read_loop(connection: Arc<Connection>, read_half: OwnedReadHalf) {
    let mut frames = FramedRead::new(read_half, ClientMessageCodec::new());
    let error = loop {
        let next = tokio::select! {
            biased;
            _ = connection.shutdown.cancelled() => return,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(message)) => {
                *connection.last_read_at.lock() = Instant::now();
                trace!(
                    id = %connection.id,
                    correlation_id = ?message.correlation_id(),
                    message_type = ?message.message_type(),
                    "received message"
                );
                match connection.invocations.upgrade() {
                    Some(invocations) => invocations.handle_response(message),
                    None => {
                        break HazelcastError::ClientNotActive(
                            "invocation service is gone".to_string(),
                        )
                    }
                }
            }
            Some(Err(err)) => {
                warn!(id = %connection.id, error = %err, "read failed");
                break err;
            }
            None => {
                break HazelcastError::Connection(format!(
                    "connection to {} closed by peer",
                    connection.address
                ))
            }
        }
    };
    connection.close(Some(error));
}

async fn write_loop(
    connection: Arc<Connection>,
    mut queue: mpsc::Receiver<ClientMessage>,
    write_half: OwnedWriteHalf,
) {
    let mut sink = FramedWrite::new(write_half, ClientMessageCodec::new());
    loop {
        let message = tokio::select! {
            biased;
            _ = connection.shutdown.cancelled() => break,
            message = queue.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let parts = if message.wire_size() > FRAGMENT_THRESHOLD {
            message.split_into_fragments(FRAGMENT_THRESHOLD, connection.next_fragment_id())
        } else {
            vec![message]
        };
        for part in parts {
            if let Err(err) = sink.send(part).await {
                warn!(id = %connection.id, error = %err, "write failed");
                connection.close(Some(err));
                return;
            }
        }
        *connection.last_write_at.lock() = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, Address) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());
        (listener, address)
    }

    #[test]
    fn test_connection_id_uniqueness() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2 > id1);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::from_raw(42).to_string(), "conn-42");
        assert_eq!(ConnectionId::from_raw(123).value(), 123);
    }

    #[tokio::test]
    async fn test_connect_writes_protocol_header() {
        let (listener, address) = listener().await;
        let dispatcher = Arc::new(EventDispatcher::new());

        let connection = Connection::connect(&address, Duration::from_secs(1), Weak::new(), dispatcher)
            .await
            .unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut header = [0u8; 3];
        socket.read_exact(&mut header).await.unwrap();
        assert_eq!(&header, CLIENT_PROTOCOL_HEADER);
        assert_eq!(connection.status(), ConnectionStatus::Connecting);
        assert!(connection.mark_open());
        assert_eq!(connection.status(), ConnectionStatus::Open);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, address) = listener().await;
        drop(listener);
        let result = Connection::connect(
            &address,
            Duration::from_secs(1),
            Weak::new(),
            Arc::new(EventDispatcher::new()),
        )
        .await;
        assert!(matches!(result, Err(HazelcastError::Connection(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_published_once() {
        let (listener, address) = listener().await;
        let dispatcher = Arc::new(EventDispatcher::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::ConnectionClosed, move |e| {
                let _ = tx.send(e);
            })
            .await
            .unwrap();

        let connection =
            Connection::connect(&address, Duration::from_secs(1), Weak::new(), dispatcher)
                .await
                .unwrap();
        let _socket = listener.accept().await.unwrap();

        assert!(connection.close(Some(HazelcastError::Connection("test".into()))));
        assert!(!connection.close(None));
        assert!(!connection.is_alive());
        assert!(connection.close_error().is_some());

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Event::ConnectionClosed { connection: closed, error } => {
                assert_eq!(closed.id(), connection.id());
                assert!(error.is_some());
            }
            other => panic!("unexpected event {:?}", other),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        let err = connection
            .write(ClientMessage::create_for_encode_any_partition(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HazelcastError::TargetDisconnected(_)));
    }

    #[tokio::test]
    async fn test_peer_close_closes_connection() {
        let (listener, address) = listener().await;
        let connection = Connection::connect(
            &address,
            Duration::from_secs(1),
            Weak::new(),
            Arc::new(EventDispatcher::new()),
        )
        .await
        .unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);

        tokio::time::timeout(Duration::from_secs(2), async {
            while connection.is_alive() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_member_uuid_is_set_once() {
        let (listener, address) = listener().await;
        let connection = Connection::connect(
            &address,
            Duration::from_secs(1),
            Weak::new(),
            Arc::new(EventDispatcher::new()),
        )
        .await
        .unwrap();
        let _socket = listener.accept().await.unwrap();

        let first = Uuid::new_v4();
        connection.set_member_uuid(first);
        connection.set_member_uuid(Uuid::new_v4());
        assert_eq!(connection.member_uuid(), Some(first));
    }

    #[test]
    fn test_connection_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Connection>();
    }
}
