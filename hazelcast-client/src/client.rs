//! Hazelcast client entry point.

use std::sync::Arc;

use hazelcast_core::{ClientMessage, Result};
use uuid::Uuid;

use crate::cluster::{ClusterService, Member, PartitionService};
use crate::config::{ClientConfig, ClientFailoverConfig};
use crate::connection::{ConnectionManager, FailoverService};
use crate::event::{Event, EventDispatcher, EventKind, SubscriptionId};
use crate::invocation::{Invocation, InvocationService};

/// The main entry point for connecting to a Hazelcast cluster.
///
/// `HazelcastClient` wires the event dispatcher, invocation service, cluster
/// views and connection manager together, and connects on construction.
///
/// # Example
///
/// ```ignore
/// use hazelcast_client::{ClientConfig, HazelcastClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::builder()
///         .cluster_name("dev")
///         .build()?;
///
///     let client = HazelcastClient::new(config).await?;
///     println!("{} members", client.members().len());
///
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct HazelcastClient {
    dispatcher: Arc<EventDispatcher>,
    invocations: Arc<InvocationService>,
    cluster: Arc<ClusterService>,
    partitions: Arc<PartitionService>,
    connection_manager: Arc<ConnectionManager>,
}

impl HazelcastClient {
    /// Creates a new client and connects to the Hazelcast cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No configured address can be reached within the retry budget
    /// - Authentication is rejected
    /// - The initial member list does not arrive in time
    pub async fn new(config: ClientConfig) -> Result<Self> {
        Self::with_failover(ClientFailoverConfig::single(config)).await
    }

    /// Creates a client that fails over between the configured clusters.
    pub async fn with_failover(config: ClientFailoverConfig) -> Result<Self> {
        Self::connect(FailoverService::new(&config)).await
    }

    /// Creates a client from prepared failover candidates, for example ones
    /// carrying a custom discovery strategy.
    pub async fn connect(failover: FailoverService) -> Result<Self> {
        let invocation_config = failover.current().config().invocation().clone();
        let dispatcher = Arc::new(EventDispatcher::new());
        let invocations = Arc::new(InvocationService::new(&invocation_config));
        let cluster = Arc::new(ClusterService::new(Arc::clone(&dispatcher)));
        let partitions = Arc::new(PartitionService::new(Arc::clone(&dispatcher)));
        let connection_manager = ConnectionManager::new(
            failover,
            Arc::clone(&invocations),
            Arc::clone(&cluster),
            Arc::clone(&partitions),
            Arc::clone(&dispatcher),
        )?;

        if let Err(err) = connection_manager.start().await {
            dispatcher.close().await;
            return Err(err);
        }

        tracing::info!(
            cluster = %connection_manager.failover().current().cluster_name(),
            client = %connection_manager.client_name(),
            "connected to Hazelcast cluster"
        );

        Ok(Self {
            dispatcher,
            invocations,
            cluster,
            partitions,
            connection_manager,
        })
    }

    /// Sends a request to any member and waits for the response.
    pub async fn invoke(&self, request: ClientMessage) -> Result<ClientMessage> {
        self.invocations.invoke(Invocation::new(request)).await
    }

    /// Sends a request to the owner of `partition_id` and waits for the response.
    pub async fn invoke_on_partition(
        &self,
        request: ClientMessage,
        partition_id: i32,
    ) -> Result<ClientMessage> {
        self.invocations
            .invoke(Invocation::on_partition(request, partition_id))
            .await
    }

    /// Returns the partition that owns the given serialized key.
    pub fn partition_id_for_key(&self, key: &[u8]) -> Result<i32> {
        self.partitions.partition_id_for_key(key)
    }

    /// Registers a handler for client events of `kind`.
    pub async fn subscribe<F>(&self, kind: EventKind, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kind, handler).await
    }

    /// Removes a handler registered with [`HazelcastClient::subscribe`].
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.dispatcher.unsubscribe(id).await
    }

    /// Returns the invocation service.
    pub fn invocation_service(&self) -> &Arc<InvocationService> {
        &self.invocations
    }

    /// Returns the member list service.
    pub fn cluster(&self) -> &Arc<ClusterService> {
        &self.cluster
    }

    /// Returns the partition table service.
    pub fn partitions(&self) -> &Arc<PartitionService> {
        &self.partitions
    }

    /// Returns the connection manager.
    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    /// Returns the name of the cluster currently connected to.
    pub fn cluster_name(&self) -> &str {
        self.connection_manager.failover().current().cluster_name()
    }

    /// Returns the id of the cluster currently connected to.
    pub fn cluster_id(&self) -> Option<Uuid> {
        self.connection_manager.cluster_id()
    }

    /// Returns the client instance name.
    pub fn name(&self) -> &str {
        self.connection_manager.client_name()
    }

    /// Returns the current list of known cluster members.
    pub fn members(&self) -> Vec<Member> {
        self.cluster.members()
    }

    /// Returns the number of active connections to cluster members.
    pub fn connection_count(&self) -> usize {
        self.connection_manager.connection_count()
    }

    /// Returns true while the client holds at least one connection.
    pub fn is_connected(&self) -> bool {
        self.connection_manager.is_connected()
    }

    /// Shuts down the client and closes all connections.
    ///
    /// Pending invocations fail with `ClientNotActive`. Lifecycle events
    /// published during shutdown are delivered before the dispatcher stops.
    pub async fn shutdown(&self) {
        tracing::info!(client = %self.name(), "shutting down Hazelcast client");
        self.connection_manager.shutdown().await;
        self.dispatcher.close().await;
    }
}
