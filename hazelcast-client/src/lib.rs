//! Async Rust client core for [Hazelcast](https://hazelcast.com/) clusters.
//!
//! This crate owns everything between a request and the socket: it connects
//! to a Hazelcast 5.x cluster over the
//! [Hazelcast Open Binary Protocol](https://github.com/hazelcast/hazelcast-client-protocol),
//! keeps one connection per member, follows membership and partition
//! ownership, and matches every response to the request that caused it.
//! It is built on [Tokio](https://tokio.rs/) and exposes every network
//! operation as an `async fn`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hazelcast_client::{ClientConfig, HazelcastClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .cluster_name("dev")
//!         .build()?;
//!     let client = HazelcastClient::new(config).await?;
//!
//!     for member in client.members() {
//!         println!("{}", member);
//!     }
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | [`ConnectionManager`] | connects, authenticates, reconciles connections with the member list, fails over between clusters |
//! | [`InvocationService`] | correlation ids, routing, response matching, listener events |
//! | [`ClusterService`] / [`PartitionService`] | versioned member list and partition table snapshots |
//! | [`EventDispatcher`] | in-process publish/subscribe bus for client events |
//! | [`CircuitBreaker`] | bounded, jittered retry of connection attempts |
//!
//! # Configuration
//!
//! Use [`ClientConfig::builder()`](ClientConfig::builder) to construct a config:
//!
//! ```rust,no_run
//! use hazelcast_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .cluster_name("production")
//!     .add_address("10.0.0.1:5701".parse::<hazelcast_client::Address>().unwrap())
//!     .connection_timeout(Duration::from_secs(10))
//!     .credentials("admin", "secret")
//!     .retry(|r| r
//!         .initial_backoff(Duration::from_millis(100))
//!         .max_backoff(Duration::from_secs(30))
//!         .multiplier(2.0)
//!         .max_retries(10))
//!     .build()
//!     .expect("invalid config");
//! ```
//!
//! # Failover
//!
//! [`ClientFailoverConfig`] lists alternative clusters. When every
//! connection to the current cluster is lost and reconnecting fails, the
//! client moves on to the next one and publishes
//! [`Event::ClusterChanged`] once it lands on a different cluster.

#![warn(missing_docs)]

mod client;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod connection;
pub mod event;
pub mod invocation;

pub use client::HazelcastClient;
pub use cluster::{
    ClusterService, Member, MemberListSnapshot, MemberVersion, PartitionService, PartitionTable,
};
pub use config::{
    ClientConfig, ClientConfigBuilder, ClientFailoverConfig, ClientFailoverConfigBuilder,
    ConfigError, InvocationConfig, InvocationConfigBuilder, NetworkConfig, NetworkConfigBuilder,
    RetryConfig, RetryConfigBuilder, SecurityConfig, SecurityConfigBuilder,
};
pub use connection::{
    CandidateCluster, CircuitBreaker, ClusterDiscovery, Connection, ConnectionId,
    ConnectionManager, ConnectionStatus, FailoverService, RetryPolicy, StaticAddressDiscovery,
};
pub use event::{Event, EventDispatcher, EventKind, LifecycleState, SubscriptionId};
pub use hazelcast_core as core;
pub use hazelcast_core::{Address, HazelcastError, Result};
pub use invocation::{
    Invocation, InvocationFuture, InvocationRouter, InvocationService, InvocationTarget,
};
