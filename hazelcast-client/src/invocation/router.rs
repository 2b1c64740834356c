//! Connection selection strategies.

use std::fmt::Debug;
use std::sync::Arc;

use hazelcast_core::{HazelcastError, Result};
use tracing::trace;

use super::InvocationTarget;
use crate::cluster::PartitionService;
use crate::connection::{Connection, ConnectionTable};

/// Picks the connection an invocation is written to.
pub trait InvocationRouter: Send + Sync + Debug {
    /// Returns a live connection for `target`.
    fn route(&self, target: &InvocationTarget) -> Result<Arc<Connection>>;
}

fn no_connection() -> HazelcastError {
    HazelcastError::Connection("no connection to the cluster is available".to_string())
}

fn bound(connections: &ConnectionTable, target: &InvocationTarget) -> Option<Result<Arc<Connection>>> {
    match target {
        InvocationTarget::Connection(id) => Some(
            connections
                .get(*id)
                .filter(|c| c.is_alive())
                .ok_or_else(|| {
                    HazelcastError::TargetDisconnected(format!("connection {} is not open", id))
                }),
        ),
        _ => None,
    }
}

/// Routes each invocation straight to the member that can serve it.
///
/// Order of preference: the bound connection, the connection to the target
/// address, the connection to the partition owner, then any connection.
#[derive(Debug)]
pub struct SmartRouter {
    connections: Arc<ConnectionTable>,
    partitions: Arc<PartitionService>,
}

impl SmartRouter {
    /// Creates a smart router over the given tables.
    pub fn new(connections: Arc<ConnectionTable>, partitions: Arc<PartitionService>) -> Self {
        Self {
            connections,
            partitions,
        }
    }
}

impl InvocationRouter for SmartRouter {
    fn route(&self, target: &InvocationTarget) -> Result<Arc<Connection>> {
        if let Some(result) = bound(&self.connections, target) {
            return result;
        }

        let direct = match target {
            InvocationTarget::Address(address) => self.connections.get_by_address(address),
            InvocationTarget::Partition(partition_id) => self
                .partitions
                .partition_owner(*partition_id)
                .and_then(|owner| self.connections.get_by_member(&owner)),
            _ => None,
        };
        if let Some(connection) = direct.filter(|c| c.is_alive()) {
            return Ok(connection);
        }

        trace!(?target, "no direct connection, using a random one");
        self.connections.random().ok_or_else(no_connection)
    }
}

/// Routes every invocation through the single kept connection.
#[derive(Debug)]
pub struct UnisocketRouter {
    connections: Arc<ConnectionTable>,
}

impl UnisocketRouter {
    /// Creates a unisocket router over the given table.
    pub fn new(connections: Arc<ConnectionTable>) -> Self {
        Self { connections }
    }
}

impl InvocationRouter for UnisocketRouter {
    fn route(&self, target: &InvocationTarget) -> Result<Arc<Connection>> {
        if let Some(result) = bound(&self.connections, target) {
            return result;
        }
        self.connections.random().ok_or_else(no_connection)
    }
}
