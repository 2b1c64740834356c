//! Connection lifecycle, authentication and membership-driven reconciliation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use hazelcast_core::protocol::constants::{CLIENT_TYPE, SERIALIZATION_VERSION};
use hazelcast_core::{Address, HazelcastError, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use super::circuit_breaker::{seeded_rng, CircuitBreaker, RetryPolicy, SharedRng};
use super::failover::{CandidateCluster, FailoverService};
use super::table::{AddOutcome, ConnectionTable};
use super::{Connection, ConnectionId};
use crate::cluster::{ClusterService, Member, PartitionService};
use crate::codec::{
    AuthenticationRequest, AuthenticationResponse, AuthenticationStatus,
    ClientAddClusterViewListenerCodec, ClientAuthenticationCodec, ClientPingCodec,
    ClusterViewEvent,
};
use crate::event::{Event, EventDispatcher, EventKind, LifecycleState, SubscriptionId};
use crate::invocation::{Invocation, InvocationService, SmartRouter, UnisocketRouter};

/// Capacity of the edge-triggered reconciliation queue.
const RECONCILE_QUEUE_CAPACITY: usize = 256;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lifecycle of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManagerState {
    /// Constructed, `start` not called yet.
    Created = 0,
    /// `start` is connecting to the first cluster.
    Starting = 1,
    /// Started; stays here across transient disconnects.
    Ready = 2,
    /// Shut down. Terminal.
    Stopped = 3,
}

impl ManagerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Starting,
            2 => Self::Ready,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
enum Reconcile {
    MembersAdded(Vec<Member>),
    ConnectionClosed(Arc<Connection>),
}

#[derive(Debug, Clone, Copy)]
struct ClusterViewListener {
    connection: ConnectionId,
    correlation_id: Option<i64>,
}

/// Removes an address from the in-flight set when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Address>>,
    address: Address,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.address);
    }
}

/// Owns the connection table and keeps it consistent with the cluster.
///
/// The manager connects through the current failover candidate, retrying
/// through a [`CircuitBreaker`]. In smart mode it then opens a connection to
/// every member, driven both by membership events and by a periodic full
/// diff; both paths funnel into [`ConnectionManager::ensure_connection`] and
/// connection close, so they never double-act. When the last connection
/// closes it reconnects, possibly to the next candidate cluster.
pub struct ConnectionManager {
    client_uuid: Uuid,
    client_name: String,
    smart_routing: bool,
    failover: FailoverService,
    connections: Arc<ConnectionTable>,
    invocations: Arc<InvocationService>,
    cluster: Arc<ClusterService>,
    partitions: Arc<PartitionService>,
    dispatcher: Arc<EventDispatcher>,
    rng: SharedRng,
    state: AtomicU8,
    connected: AtomicBool,
    cluster_id: Mutex<Option<Uuid>>,
    in_flight: Mutex<HashSet<Address>>,
    cluster_view: Mutex<Option<ClusterViewListener>>,
    reconcile_tx: mpsc::Sender<Reconcile>,
    reconcile_rx: Mutex<Option<mpsc::Receiver<Reconcile>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Creates a manager and installs its routing strategy on `invocations`.
    pub fn new(
        failover: FailoverService,
        invocations: Arc<InvocationService>,
        cluster: Arc<ClusterService>,
        partitions: Arc<PartitionService>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Result<Arc<Self>> {
        let client_uuid = Uuid::new_v4();
        let primary = failover.current().config();
        let client_name = primary
            .client_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("hz.client_{}", client_uuid.simple()));
        let smart_routing = primary.network().smart_routing();

        let connections = Arc::new(ConnectionTable::new());
        if smart_routing {
            invocations.set_router(Arc::new(SmartRouter::new(
                Arc::clone(&connections),
                Arc::clone(&partitions),
            )))?;
        } else {
            invocations.set_router(Arc::new(UnisocketRouter::new(Arc::clone(&connections))))?;
        }

        let (reconcile_tx, reconcile_rx) = mpsc::channel(RECONCILE_QUEUE_CAPACITY);
        Ok(Arc::new(Self {
            client_uuid,
            client_name,
            smart_routing,
            failover,
            connections,
            invocations,
            cluster,
            partitions,
            dispatcher,
            rng: seeded_rng(),
            state: AtomicU8::new(ManagerState::Created as u8),
            connected: AtomicBool::new(false),
            cluster_id: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            cluster_view: Mutex::new(None),
            reconcile_tx,
            reconcile_rx: Mutex::new(Some(reconcile_rx)),
            subscriptions: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Connects to the first reachable candidate cluster.
    ///
    /// Returns once a connection is authenticated and the initial member
    /// list has arrived, so no invocation is partition-routed before a
    /// partition table exists. On failure the manager is shut down.
    #[instrument(
        name = "connection_manager.start",
        skip(self),
        fields(client = %self.client_name, smart = self.smart_routing)
    )]
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if let Err(actual) = self.state.compare_exchange(
            ManagerState::Created as u8,
            ManagerState::Starting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match ManagerState::from_u8(actual) {
                ManagerState::Stopped => {
                    HazelcastError::ClientNotActive("connection manager is shut down".to_string())
                }
                state => HazelcastError::IllegalState(format!(
                    "connection manager cannot start from state {:?}",
                    state
                )),
            });
        }
        self.dispatcher
            .publish(Event::LifecycleStateChanged(LifecycleState::Starting));

        self.subscribe_events().await?;
        self.spawn_reconciliation();

        if let Err(err) = self.connect_to_cluster().await {
            error!(error = %err, "could not connect to any cluster");
            self.shutdown().await;
            return Err(err);
        }

        if self
            .state
            .compare_exchange(
                ManagerState::Starting as u8,
                ManagerState::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(HazelcastError::ClientNotActive(
                "connection manager was shut down while starting".to_string(),
            ));
        }
        self.connected.store(true, Ordering::Release);
        self.dispatcher.publish(Event::Connected);
        self.spawn_heartbeat();
        self.dispatcher
            .publish(Event::LifecycleStateChanged(LifecycleState::Started));
        info!(connections = self.connections.len(), "connection manager started");
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<()> {
        let queue = self.reconcile_tx.clone();
        let closed = self
            .dispatcher
            .subscribe(EventKind::ConnectionClosed, move |event| {
                if let Event::ConnectionClosed { connection, .. } = event {
                    if queue.try_send(Reconcile::ConnectionClosed(connection)).is_err() {
                        trace!("reconciliation queue full, leaving close to the periodic pass");
                    }
                }
            })
            .await?;

        let queue = self.reconcile_tx.clone();
        let added = self
            .dispatcher
            .subscribe(EventKind::MembersAdded, move |event| {
                if let Event::MembersAdded(members) = event {
                    if queue.try_send(Reconcile::MembersAdded(members)).is_err() {
                        trace!("reconciliation queue full, leaving members to the periodic pass");
                    }
                }
            })
            .await?;

        self.subscriptions.lock().extend([closed, added]);
        Ok(())
    }

    fn spawn_reconciliation(self: &Arc<Self>) {
        let Some(queue) = self.reconcile_rx.lock().take() else {
            return;
        };
        let interval = self.failover.current().config().network().reconciliation_interval();
        tokio::spawn(reconciliation_loop(
            Arc::downgrade(self),
            queue,
            interval,
            self.shutdown.clone(),
        ));
    }

    fn spawn_heartbeat(self: &Arc<Self>) {
        let network = self.failover.current().config().network();
        tokio::spawn(heartbeat_loop(
            Arc::downgrade(self),
            network.heartbeat_interval(),
            network.heartbeat_timeout(),
            self.shutdown.clone(),
        ));
    }

    /// Tries candidate clusters until one connects, advancing the failover
    /// service once per failed candidate.
    async fn connect_to_cluster(&self) -> Result<()> {
        let max_attempts = self.failover.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let next = self.failover.next();
                info!(cluster = next.cluster_name(), attempt, "trying next candidate cluster");
            }
            if self.shutdown.is_cancelled() {
                return Err(HazelcastError::ClientNotActive(
                    "connection manager is shut down".to_string(),
                ));
            }

            let candidate = self.failover.current();
            match self.connect_to_candidate(candidate).await {
                Ok(()) => {
                    info!(cluster = candidate.cluster_name(), "connected to cluster");
                    return Ok(());
                }
                Err(err @ HazelcastError::ClientNotActive(_))
                | Err(err @ HazelcastError::Cancelled(_)) => return Err(err),
                Err(err) => {
                    warn!(cluster = candidate.cluster_name(), error = %err, "cluster connection failed");
                    for connection in self.connections.clear() {
                        connection.close(None);
                    }
                    *self.cluster_view.lock() = None;
                    last_error = Some(err);
                }
            }
        }

        Err(HazelcastError::IllegalState(match last_error {
            Some(err) => format!(
                "unable to connect to any cluster after {} attempts: {}",
                max_attempts, err
            ),
            None => "no candidate cluster configured".to_string(),
        }))
    }

    async fn connect_to_candidate(&self, candidate: &CandidateCluster) -> Result<()> {
        let addresses = candidate.discovery().discover().await?;
        if addresses.is_empty() {
            return Err(HazelcastError::Configuration(format!(
                "no addresses discovered for cluster {}",
                candidate.cluster_name()
            )));
        }
        debug!(count = addresses.len(), "discovered cluster addresses");

        let breaker = CircuitBreaker::new(RetryPolicy::from_config(
            candidate.config().retry(),
            Arc::clone(&self.rng),
        ));
        let addresses = addresses.as_slice();
        breaker
            .try_execute(&self.shutdown, move |attempt| async move {
                self.connect_to_any(addresses, attempt).await
            })
            .await?;

        self.cluster
            .wait_initial_member_list(candidate.config().initial_member_list_timeout())
            .await
    }

    async fn connect_to_any(&self, addresses: &[Address], attempt: u32) -> Result<()> {
        let mut last_error = None;
        for address in addresses {
            match self.ensure_connection(address).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_non_retryable() => return Err(err),
                Err(err) => {
                    debug!(%address, attempt, error = %err, "connection attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            HazelcastError::Connection("no address could be reached".to_string())
        }))
    }

    /// Returns the connection to `address`, opening and authenticating one
    /// if needed. Idempotent: a concurrent call for the same address fails
    /// fast instead of opening a second connection.
    #[instrument(
        name = "connection_manager.ensure_connection",
        skip(self, address),
        fields(address = %address)
    )]
    pub async fn ensure_connection(&self, address: &Address) -> Result<Arc<Connection>> {
        if self.shutdown.is_cancelled() {
            return Err(HazelcastError::ClientNotActive(
                "connection manager is shut down".to_string(),
            ));
        }
        if let Some(existing) = self.connections.get_by_address(address) {
            if existing.is_alive() {
                return Ok(existing);
            }
        }
        if !self.smart_routing {
            if let Some(existing) = self.connections.random() {
                return Ok(existing);
            }
        }

        if !self.in_flight.lock().insert(address.clone()) {
            return Err(HazelcastError::Connection(format!(
                "connection to {} is already being opened",
                address
            )));
        }
        let _guard = InFlight {
            set: &self.in_flight,
            address: address.clone(),
        };

        let timeout = self.failover.current().config().network().connection_timeout();
        let connection = Connection::connect(
            address,
            timeout,
            Arc::downgrade(&self.invocations),
            Arc::clone(&self.dispatcher),
        )
        .await?;

        match self.on_authenticated(&connection).await {
            Ok(connection) => Ok(connection),
            Err(err) => {
                connection.close(Some(HazelcastError::Connection(format!(
                    "handshake failed: {}",
                    err
                ))));
                Err(err)
            }
        }
    }

    async fn authenticate(&self, connection: &Arc<Connection>) -> Result<AuthenticationResponse> {
        let candidate = self.failover.current();
        let config = candidate.config();
        let request = AuthenticationRequest {
            cluster_name: candidate.cluster_name().to_string(),
            username: config.security().username().map(str::to_string),
            password: config.security().password().map(str::to_string),
            client_uuid: self.client_uuid,
            client_type: CLIENT_TYPE.to_string(),
            serialization_version: SERIALIZATION_VERSION,
            client_version: CLIENT_VERSION.to_string(),
            client_name: self.client_name.clone(),
            labels: config.labels().to_vec(),
        };

        let invocation = Invocation::on_connection(
            ClientAuthenticationCodec::encode_request(&request),
            connection.id(),
        )
        .with_timeout(config.network().connection_timeout());
        let response = self.invocations.invoke_on(connection, invocation).await?;
        let response = ClientAuthenticationCodec::decode_response(&response)?;

        match response.status {
            AuthenticationStatus::Authenticated => Ok(response),
            AuthenticationStatus::CredentialsFailed => Err(HazelcastError::Authentication(format!(
                "cluster {} rejected the cluster name or credentials",
                candidate.cluster_name()
            ))),
            AuthenticationStatus::SerializationVersionMismatch => {
                Err(HazelcastError::SerializationVersionMismatch(format!(
                    "member {} uses serialization version {}, client uses {}",
                    connection.address(),
                    response.serialization_version,
                    SERIALIZATION_VERSION
                )))
            }
            AuthenticationStatus::NotAllowedInCluster => Err(HazelcastError::NotAllowedInCluster(
                format!("member {} does not allow this client", connection.address()),
            )),
        }
    }

    async fn on_authenticated(&self, connection: &Arc<Connection>) -> Result<Arc<Connection>> {
        let response = self.authenticate(connection).await?;

        let member_uuid = response.member_uuid.ok_or_else(|| {
            HazelcastError::Protocol("authentication response carries no member UUID".to_string())
        })?;
        let cluster_id = response.cluster_id.ok_or_else(|| {
            HazelcastError::Protocol("authentication response carries no cluster id".to_string())
        })?;
        connection.set_member_uuid(member_uuid);

        if self.failover.candidate_count() > 1 && !response.failover_supported {
            return Err(HazelcastError::IllegalState(format!(
                "member {} does not support client failover",
                connection.address()
            ))
            .non_retryable());
        }

        if !self
            .partitions
            .check_and_set_partition_count(response.partition_count)
        {
            return Err(HazelcastError::IllegalState(format!(
                "member {} reports {} partitions, expected {}",
                connection.address(),
                response.partition_count,
                self.partitions.partition_count()
            ))
            .non_retryable());
        }

        if let Some(previous) = self.check_cluster_id(connection, cluster_id)? {
            info!(%previous, current = %cluster_id, "switched to a different cluster");
            self.cluster.reset();
            self.partitions.reset();
            self.dispatcher.publish(Event::ClusterChanged {
                previous,
                current: cluster_id,
            });
        }

        if !connection.mark_open() {
            return Err(HazelcastError::Connection(format!(
                "connection to {} closed during authentication",
                connection.address()
            )));
        }
        let connection = match self.connections.add(Arc::clone(connection)) {
            AddOutcome::Added | AddOutcome::AlreadyPresent => Arc::clone(connection),
            AddOutcome::AddressTaken(existing) => {
                debug!(%existing, "address already connected, dropping the new connection");
                connection.close(None);
                return self.connections.get(existing).ok_or_else(|| {
                    HazelcastError::Connection(format!(
                        "connection to {} closed concurrently",
                        connection.address()
                    ))
                });
            }
        };

        info!(
            id = %connection.id(),
            member = %member_uuid,
            address = %connection.address(),
            reported_address = ?response.address,
            server_version = %response.server_version,
            "authenticated"
        );
        self.dispatcher
            .publish(Event::ConnectionOpened(Arc::clone(&connection)));

        if let Err(err) = self.register_cluster_view_listener(&connection).await {
            warn!(id = %connection.id(), error = %err, "cluster view listener registration failed");
        }
        Ok(connection)
    }

    /// Adopts or checks the cluster id reported by a new connection.
    ///
    /// Returns the previous id when the client moved to another cluster.
    fn check_cluster_id(&self, connection: &Connection, new_id: Uuid) -> Result<Option<Uuid>> {
        let mut current = self.cluster_id.lock();
        match *current {
            Some(existing) if existing != new_id => {
                if !self.connections.is_empty() {
                    return Err(HazelcastError::IllegalState(format!(
                        "member {} belongs to cluster {} but the client is connected to cluster {}",
                        connection.address(),
                        new_id,
                        existing
                    )));
                }
                *current = Some(new_id);
                Ok(Some(existing))
            }
            _ => {
                *current = Some(new_id);
                Ok(None)
            }
        }
    }

    async fn register_cluster_view_listener(&self, connection: &Arc<Connection>) -> Result<()> {
        {
            let mut slot = self.cluster_view.lock();
            if slot.is_some() {
                return Ok(());
            }
            *slot = Some(ClusterViewListener {
                connection: connection.id(),
                correlation_id: None,
            });
        }

        let cluster = Arc::clone(&self.cluster);
        let partitions = Arc::clone(&self.partitions);
        let source = connection.id();
        let invocation = Invocation::on_connection(
            ClientAddClusterViewListenerCodec::encode_request(),
            connection.id(),
        )
        .with_event_handler(move |message| {
            match ClientAddClusterViewListenerCodec::decode_event(&message) {
                Ok(ClusterViewEvent::MembersView { version, members }) => {
                    cluster.apply_members_view(version, members);
                }
                Ok(ClusterViewEvent::PartitionsView {
                    version,
                    partitions: owners,
                }) => {
                    partitions.apply_partitions_view(source, version, owners);
                }
                Err(err) => warn!(error = %err, "undecodable cluster view event"),
            }
        });

        let future = self.invocations.send_on(connection, invocation).await;
        let correlation_id = future.correlation_id();
        match future.wait().await {
            Ok(_) => {
                if let Some(listener) = self.cluster_view.lock().as_mut() {
                    if listener.connection == source {
                        listener.correlation_id = Some(correlation_id);
                    }
                }
                debug!(id = %source, correlation_id, "cluster view listener registered");
                Ok(())
            }
            Err(err) => {
                self.invocations.remove_event_handler(correlation_id);
                let mut slot = self.cluster_view.lock();
                if slot.map(|l| l.connection) == Some(source) {
                    *slot = None;
                }
                Err(err)
            }
        }
    }

    /// Closes a connection. The table entry is dropped when the close
    /// notification is processed.
    pub fn drop_connection(&self, connection: &Arc<Connection>, reason: &str) {
        debug!(id = %connection.id(), address = %connection.address(), reason, "dropping connection");
        connection.close(Some(HazelcastError::Connection(reason.to_string())));
    }

    async fn on_connection_closed(&self, connection: Arc<Connection>) {
        let registered = self.connections.remove(connection.id()).is_some();
        if registered {
            debug!(id = %connection.id(), remaining = self.connections.len(), "connection removed");
        }

        let lost_listener = {
            let mut slot = self.cluster_view.lock();
            match *slot {
                Some(listener) if listener.connection == connection.id() => {
                    *slot = None;
                    listener.correlation_id
                }
                _ => None,
            }
        };
        if let Some(correlation_id) = lost_listener {
            self.invocations.remove_event_handler(correlation_id);
            if let Some(next) = self.connections.random() {
                if let Err(err) = self.register_cluster_view_listener(&next).await {
                    warn!(error = %err, "cluster view listener re-registration failed");
                }
            }
        }

        if registered && self.connections.is_empty() {
            self.handle_disconnect().await;
        }
    }

    /// Reconnects after the last connection closed.
    async fn handle_disconnect(&self) {
        if self.state() != ManagerState::Ready {
            return;
        }
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        warn!("lost every connection to the cluster, reconnecting");
        self.dispatcher.publish(Event::Disconnected);

        for connection in self.connections.clear() {
            connection.close(None);
        }
        *self.cluster_view.lock() = None;
        self.cluster.clear_member_list_version();

        match self.connect_to_cluster().await {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                self.dispatcher.publish(Event::Connected);
            }
            Err(err) => {
                error!(error = %err, "reconnection failed, shutting down");
                self.shutdown().await;
            }
        }
    }

    async fn connect_to_members(&self, members: Vec<Member>) {
        if !self.smart_routing || self.state() != ManagerState::Ready {
            return;
        }
        let missing: Vec<Address> = members
            .iter()
            .filter(|m| {
                self.connections.get_by_member(&m.uuid()).is_none()
                    && !self.connections.contains_address(m.address())
            })
            .map(|m| m.address().clone())
            .collect();
        if missing.is_empty() {
            return;
        }

        debug!(count = missing.len(), "opening connections to members");
        let results = join_all(missing.iter().map(|address| self.ensure_connection(address))).await;
        for (address, result) in missing.iter().zip(results) {
            if let Err(err) = result {
                debug!(%address, error = %err, "could not connect to member");
            }
        }
    }

    /// One full pass comparing the connection table with the member list.
    async fn reconcile(&self) {
        if self.state() != ManagerState::Ready {
            return;
        }

        for connection in self.connections.snapshot() {
            if !connection.is_alive() {
                self.on_connection_closed(connection).await;
            }
        }
        if self.connections.is_empty() {
            self.handle_disconnect().await;
            return;
        }
        if !self.smart_routing {
            return;
        }

        let members = self.cluster.members();
        if members.is_empty() {
            return;
        }
        let member_ids: HashSet<Uuid> = members.iter().map(Member::uuid).collect();
        for connection in self.connections.snapshot() {
            if let Some(member) = connection.member_uuid() {
                if !member_ids.contains(&member) {
                    self.drop_connection(&connection, "member left the cluster");
                }
            }
        }
        self.connect_to_members(members).await;
    }

    fn check_heartbeats(&self, interval: Duration, timeout: Duration) {
        let now = Instant::now();
        for connection in self.connections.snapshot() {
            if !connection.is_alive() {
                continue;
            }
            if now.duration_since(connection.last_read_at()) > timeout {
                warn!(id = %connection.id(), ?timeout, "heartbeat timed out");
                connection.close(Some(HazelcastError::Connection(format!(
                    "no message received from {} for {:?}",
                    connection.address(),
                    timeout
                ))));
                continue;
            }
            if now.duration_since(connection.last_write_at()) > interval {
                trace!(id = %connection.id(), "sending ping");
                let invocations = Arc::clone(&self.invocations);
                let id = connection.id();
                tokio::spawn(async move {
                    let invocation =
                        Invocation::on_connection(ClientPingCodec::encode_request(), id)
                            .with_timeout(timeout);
                    if let Err(err) = invocations.invoke(invocation).await {
                        trace!(%id, error = %err, "ping failed");
                    }
                });
            }
        }
    }

    /// Shuts the manager down. Idempotent.
    ///
    /// Pending invocations fail with `ClientNotActive`, every connection is
    /// closed and the background tasks stop.
    #[instrument(name = "connection_manager.shutdown", skip(self), fields(client = %self.client_name))]
    pub async fn shutdown(&self) {
        let previous = self
            .state
            .swap(ManagerState::Stopped as u8, Ordering::AcqRel);
        if previous == ManagerState::Stopped as u8 {
            return;
        }
        self.dispatcher
            .publish(Event::LifecycleStateChanged(LifecycleState::ShuttingDown));

        self.shutdown.cancel();
        self.invocations.shutdown();
        let closed = self.connections.clear();
        debug!(connection_count = closed.len(), "closing all connections");
        for connection in closed {
            connection.close(None);
        }
        *self.cluster_view.lock() = None;

        let subscriptions: Vec<SubscriptionId> = self.subscriptions.lock().drain(..).collect();
        for id in subscriptions {
            let _ = self.dispatcher.unsubscribe(id).await;
        }

        if self.connected.swap(false, Ordering::AcqRel) {
            self.dispatcher.publish(Event::Disconnected);
        }
        self.dispatcher
            .publish(Event::LifecycleStateChanged(LifecycleState::Shutdown));
        info!("connection manager shut down");
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ManagerState {
        ManagerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true while at least one connection is up and the initial
    /// member list has been received.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns the id of the cluster the client is connected to.
    pub fn cluster_id(&self) -> Option<Uuid> {
        *self.cluster_id.lock()
    }

    /// Returns this client's UUID as sent during authentication.
    pub fn client_uuid(&self) -> Uuid {
        self.client_uuid
    }

    /// Returns this client's name.
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Returns whether smart routing is enabled.
    pub fn is_smart_routing(&self) -> bool {
        self.smart_routing
    }

    /// Returns the failover service.
    pub fn failover(&self) -> &FailoverService {
        &self.failover
    }

    /// Returns the number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns every registered connection.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.snapshot()
    }

    /// Returns the connection to the given member.
    pub fn connection_for_member(&self, member: &Uuid) -> Option<Arc<Connection>> {
        self.connections.get_by_member(member)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_uuid", &self.client_uuid)
            .field("client_name", &self.client_name)
            .field("smart_routing", &self.smart_routing)
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .field("connections", &self.connections.len())
            .finish()
    }
}

async fn reconciliation_loop(
    manager: Weak<ConnectionManager>,
    mut queue: mpsc::Receiver<Reconcile>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let work = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = queue.recv() => match item {
                Some(item) => Some(item),
                None => break,
            },
            _ = ticker.tick() => None,
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };
        match work {
            Some(Reconcile::ConnectionClosed(connection)) => {
                manager.on_connection_closed(connection).await
            }
            Some(Reconcile::MembersAdded(members)) => manager.connect_to_members(members).await,
            None => manager.reconcile().await,
        }
    }
    debug!("reconciliation task stopped");
}

async fn heartbeat_loop(
    manager: Weak<ConnectionManager>,
    interval: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match manager.upgrade() {
            Some(manager) => manager.check_heartbeats(interval, timeout),
            None => break,
        }
    }
    debug!("heartbeat task stopped");
}
