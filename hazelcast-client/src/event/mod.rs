//! Internal event bus connecting connections, cluster views and the connection manager.

mod dispatcher;

use std::fmt;
use std::sync::Arc;

use hazelcast_core::HazelcastError;
use uuid::Uuid;

use crate::cluster::Member;
use crate::connection::Connection;

pub use dispatcher::EventDispatcher;

/// Unique identifier for an event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a new unique subscription ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

/// Client lifecycle states published as [`Event::LifecycleStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// The client is starting and initializing resources.
    Starting,
    /// The client has started and is ready to accept operations.
    Started,
    /// The client is beginning the shutdown process.
    ShuttingDown,
    /// The client has completed shutdown.
    Shutdown,
}

impl LifecycleState {
    /// Returns a human-readable name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A notification published on the event bus.
///
/// Values are immutable and carry only what subscribers need.
#[derive(Debug, Clone)]
pub enum Event {
    /// An authenticated connection was registered.
    ConnectionOpened(Arc<Connection>),
    /// A connection was closed, with the error that caused it if any.
    ConnectionClosed {
        /// The closed connection.
        connection: Arc<Connection>,
        /// Why the connection was closed.
        error: Option<Arc<HazelcastError>>,
    },
    /// Members joined the cluster.
    MembersAdded(Vec<Member>),
    /// Members left the cluster.
    MembersRemoved(Vec<Member>),
    /// A newer partition table was installed.
    PartitionsUpdated {
        /// Version of the installed table.
        version: i32,
    },
    /// The client became connected to a cluster.
    Connected,
    /// The client lost every connection to the cluster.
    Disconnected,
    /// The client reconnected to a cluster with a different cluster id.
    ClusterChanged {
        /// Cluster id before the disconnect.
        previous: Uuid,
        /// Cluster id now in use.
        current: Uuid,
    },
    /// The client moved to a new lifecycle state.
    LifecycleStateChanged(LifecycleState),
}

impl Event {
    /// Returns the subscription key this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConnectionOpened(_) => EventKind::ConnectionOpened,
            Event::ConnectionClosed { .. } => EventKind::ConnectionClosed,
            Event::MembersAdded(_) => EventKind::MembersAdded,
            Event::MembersRemoved(_) => EventKind::MembersRemoved,
            Event::PartitionsUpdated { .. } => EventKind::PartitionsUpdated,
            Event::Connected => EventKind::Connected,
            Event::Disconnected => EventKind::Disconnected,
            Event::ClusterChanged { .. } => EventKind::ClusterChanged,
            Event::LifecycleStateChanged(_) => EventKind::LifecycleStateChanged,
        }
    }
}

/// Names an [`Event`] variant for subscription purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`Event::ConnectionOpened`].
    ConnectionOpened,
    /// See [`Event::ConnectionClosed`].
    ConnectionClosed,
    /// See [`Event::MembersAdded`].
    MembersAdded,
    /// See [`Event::MembersRemoved`].
    MembersRemoved,
    /// See [`Event::PartitionsUpdated`].
    PartitionsUpdated,
    /// See [`Event::Connected`].
    Connected,
    /// See [`Event::Disconnected`].
    Disconnected,
    /// See [`Event::ClusterChanged`].
    ClusterChanged,
    /// See [`Event::LifecycleStateChanged`].
    LifecycleStateChanged,
}

/// Callback invoked for every event of the kind it was subscribed to.
///
/// Each invocation runs on its own task, so handlers may be called
/// concurrently and in any order relative to other handlers.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;
