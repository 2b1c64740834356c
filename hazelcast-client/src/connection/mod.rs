//! Connections to cluster members and the machinery that keeps them open.

mod circuit_breaker;
mod connection;
mod discovery;
mod failover;
mod manager;
mod table;

pub use circuit_breaker::{
    exponential_backoff, seeded_rng, BackoffFn, CircuitBreaker, CircuitBreakerState, RetryPolicy,
    SharedRng,
};
pub use connection::{Connection, ConnectionId, ConnectionStatus};
pub use discovery::{ClusterDiscovery, StaticAddressDiscovery};
pub use failover::{CandidateCluster, FailoverService};
pub use manager::{ConnectionManager, ManagerState};
pub use table::{AddOutcome, ConnectionTable};
