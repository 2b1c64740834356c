//! Common test utilities for integration tests.
//!
//! [`MockMember`] speaks just enough of the client protocol over a local
//! `TcpListener` to authenticate a client, push cluster views, answer pings
//! and echo everything else.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hazelcast_client::codec::{
    AuthenticationResponse, AuthenticationStatus, ClientAddClusterViewListenerCodec,
    ClientAuthenticationCodec, ClientPingCodec,
};
use hazelcast_client::core::protocol::constants::{
    CLIENT_ADD_CLUSTER_VIEW_LISTENER, CLIENT_AUTHENTICATION, CLIENT_PING, SERIALIZATION_VERSION,
};
use hazelcast_client::core::{ClientMessage, ClientMessageCodec};
use hazelcast_client::{Address, ClientConfig, ClientConfigBuilder, Member};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Requests of this type are swallowed without a reply.
pub const SILENT_MESSAGE_TYPE: i32 = 0x7F0000;

/// Any other request type is answered with `type + 1`.
pub const ECHO_MESSAGE_TYPE: i32 = 0x7E0000;

pub const PARTITION_COUNT: i32 = 271;

/// Tunables of a mock member.
#[derive(Debug, Clone)]
pub struct MockOptions {
    pub cluster_id: Uuid,
    pub status: AuthenticationStatus,
    pub partition_count: i32,
    /// Members announced besides the mock itself.
    pub peers: Vec<Member>,
    pub members_version: i32,
    pub partitions_version: i32,
    /// When false the listener registration is acknowledged but no view
    /// is ever pushed.
    pub push_cluster_view: bool,
    /// Reported in the authentication response.
    pub failover_supported: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            cluster_id: Uuid::new_v4(),
            status: AuthenticationStatus::Authenticated,
            partition_count: PARTITION_COUNT,
            peers: Vec::new(),
            members_version: 1,
            partitions_version: 1,
            push_cluster_view: true,
            failover_supported: true,
        }
    }
}

struct Shared {
    options: Mutex<MockOptions>,
    authentications: AtomicUsize,
    silent_requests: AtomicUsize,
    connections: Mutex<Vec<CancellationToken>>,
}

/// A fake cluster member bound to `127.0.0.1:0`.
pub struct MockMember {
    address: Address,
    member_uuid: Uuid,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl MockMember {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        init_test_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());
        let member_uuid = Uuid::new_v4();
        let shared = Arc::new(Shared {
            options: Mutex::new(options),
            authentications: AtomicUsize::new(0),
            silent_requests: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();

        let member = Member::new(member_uuid, address.clone());
        tokio::spawn(accept_loop(
            listener,
            member,
            Arc::clone(&shared),
            shutdown.clone(),
        ));

        Self {
            address,
            member_uuid,
            shared,
            shutdown,
        }
    }

    pub fn address(&self) -> Address {
        self.address.clone()
    }

    pub fn member_uuid(&self) -> Uuid {
        self.member_uuid
    }

    pub fn member(&self) -> Member {
        Member::new(self.member_uuid, self.address.clone())
    }

    pub fn cluster_id(&self) -> Uuid {
        self.shared.options.lock().cluster_id
    }

    /// Changes the cluster id reported by later authentications.
    pub fn set_cluster_id(&self, cluster_id: Uuid) {
        self.shared.options.lock().cluster_id = cluster_id;
    }

    pub fn authentication_count(&self) -> usize {
        self.shared.authentications.load(Ordering::SeqCst)
    }

    pub fn silent_request_count(&self) -> usize {
        self.shared.silent_requests.load(Ordering::SeqCst)
    }

    /// Closes every open client socket but keeps accepting new ones.
    pub fn drop_connections(&self) {
        for token in self.shared.connections.lock().drain(..) {
            token.cancel();
        }
    }

    /// Stops accepting and closes every open client socket.
    pub fn stop(&self) {
        self.shutdown.cancel();
        self.drop_connections();
    }
}

impl Drop for MockMember {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    member: Member,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) {
    loop {
        let socket = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, _)) => socket,
                Err(_) => break,
            },
        };
        let token = shutdown.child_token();
        shared.connections.lock().push(token.clone());
        tokio::spawn(serve(socket, member.clone(), Arc::clone(&shared), token));
    }
}

async fn serve(mut socket: TcpStream, member: Member, shared: Arc<Shared>, closed: CancellationToken) {
    let mut header = [0u8; 3];
    if socket.read_exact(&mut header).await.is_err() || &header != b"CP2" {
        return;
    }
    let (read, write) = socket.into_split();
    let mut reader = FramedRead::new(read, ClientMessageCodec::new());
    let mut writer = FramedWrite::new(write, ClientMessageCodec::new());

    loop {
        let message = tokio::select! {
            _ = closed.cancelled() => break,
            next = reader.next() => match next {
                Some(Ok(message)) => message,
                _ => break,
            },
        };
        let Some(correlation_id) = message.correlation_id() else {
            break;
        };

        let replies = match message.message_type() {
            Some(CLIENT_AUTHENTICATION) => {
                shared.authentications.fetch_add(1, Ordering::SeqCst);
                let options = shared.options.lock().clone();
                vec![ClientAuthenticationCodec::encode_response(
                    correlation_id,
                    &AuthenticationResponse {
                        status: options.status,
                        address: Some(member.address().clone()),
                        member_uuid: Some(member.uuid()),
                        serialization_version: SERIALIZATION_VERSION,
                        server_version: "5.3.0".to_string(),
                        partition_count: options.partition_count,
                        cluster_id: Some(options.cluster_id),
                        failover_supported: options.failover_supported,
                    },
                )]
            }
            Some(CLIENT_ADD_CLUSTER_VIEW_LISTENER) => {
                let options = shared.options.lock().clone();
                let mut members = vec![member.clone()];
                members.extend(options.peers.iter().cloned());
                let partitions: Vec<(Uuid, Vec<i32>)> =
                    vec![(member.uuid(), (0..options.partition_count).collect())];
                let mut replies =
                    vec![ClientAddClusterViewListenerCodec::encode_response(correlation_id)];
                if options.push_cluster_view {
                    replies.push(ClientAddClusterViewListenerCodec::encode_members_view_event(
                        correlation_id,
                        options.members_version,
                        &members,
                    ));
                    replies.push(
                        ClientAddClusterViewListenerCodec::encode_partitions_view_event(
                            correlation_id,
                            options.partitions_version,
                            &partitions,
                        ),
                    );
                }
                replies
            }
            Some(CLIENT_PING) => vec![ClientPingCodec::encode_response(correlation_id)],
            Some(SILENT_MESSAGE_TYPE) => {
                shared.silent_requests.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            }
            Some(message_type) => vec![ClientMessage::create_for_response(
                message_type + 1,
                correlation_id,
            )],
            None => break,
        };

        for reply in replies {
            if writer.send(reply).await.is_err() {
                return;
            }
        }
    }
}

/// Installs a test-writer subscriber once; `RUST_LOG` overrides the level.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Config pointing at the given addresses with fast retries.
pub fn config_for(addresses: &[Address]) -> ClientConfig {
    builder_for(addresses).build().expect("failed to build config")
}

pub fn builder_for(addresses: &[Address]) -> ClientConfigBuilder {
    ClientConfigBuilder::new()
        .cluster_name("dev")
        .addresses(addresses.iter().cloned())
        .connection_timeout(Duration::from_millis(500))
        .initial_member_list_timeout(Duration::from_secs(2))
        .retry(|r| {
            r.initial_backoff(Duration::from_millis(10))
                .max_backoff(Duration::from_millis(50))
                .max_retries(3)
                .cluster_connect_timeout(Duration::from_secs(5))
        })
}

/// An address nothing listens on.
pub async fn unused_address() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = Address::from(listener.local_addr().unwrap());
    drop(listener);
    address
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
