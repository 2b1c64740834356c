//! Partition table snapshots and key-to-partition mapping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use hazelcast_core::protocol::compute_partition_hash;
use hazelcast_core::{HazelcastError, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::ConnectionId;
use crate::event::{Event, EventDispatcher};

/// An immutable partition-to-owner table and its version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTable {
    version: i32,
    source: Option<ConnectionId>,
    owners: HashMap<i32, Uuid>,
}

impl PartitionTable {
    /// Returns the table version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns the connection the table arrived on.
    pub fn source(&self) -> Option<ConnectionId> {
        self.source
    }

    /// Returns the owner of a partition.
    pub fn owner(&self, partition_id: i32) -> Option<Uuid> {
        self.owners.get(&partition_id).copied()
    }

    /// Returns the number of partitions with a known owner.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns true if no owners are known.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Tracks partition ownership for smart routing.
#[derive(Debug)]
pub struct PartitionService {
    table: RwLock<Arc<PartitionTable>>,
    partition_count: AtomicI32,
    dispatcher: Arc<EventDispatcher>,
}

impl PartitionService {
    /// Creates a service with no partition information.
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            table: RwLock::new(Arc::new(PartitionTable {
                version: -1,
                ..PartitionTable::default()
            })),
            partition_count: AtomicI32::new(0),
            dispatcher,
        }
    }

    /// Returns the current table.
    pub fn table(&self) -> Arc<PartitionTable> {
        Arc::clone(&self.table.read())
    }

    /// Returns the partition count, or 0 before the first authentication.
    pub fn partition_count(&self) -> i32 {
        self.partition_count.load(Ordering::Acquire)
    }

    /// Records the partition count on first use and checks it afterwards.
    ///
    /// Returns false if a different count was already recorded.
    pub fn check_and_set_partition_count(&self, count: i32) -> bool {
        match self
            .partition_count
            .compare_exchange(0, count, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(existing) => existing == count,
        }
    }

    /// Installs a partitions view pushed over `source`.
    ///
    /// Empty views and views whose version is not newer than the current
    /// table are ignored. Returns true if the table was replaced.
    pub fn apply_partitions_view(
        &self,
        source: ConnectionId,
        version: i32,
        partitions: Vec<(Uuid, Vec<i32>)>,
    ) -> bool {
        if partitions.is_empty() {
            return false;
        }
        {
            let mut current = self.table.write();
            if version <= current.version {
                debug!(version, current = current.version, "ignoring stale partitions view");
                return false;
            }
            let owners = partitions
                .into_iter()
                .flat_map(|(owner, ids)| ids.into_iter().map(move |id| (id, owner)))
                .collect();
            *current = Arc::new(PartitionTable {
                version,
                source: Some(source),
                owners,
            });
        }
        debug!(version, %source, "partition table updated");
        self.dispatcher.publish(Event::PartitionsUpdated { version });
        true
    }

    /// Returns the owner of a partition, if known.
    pub fn partition_owner(&self, partition_id: i32) -> Option<Uuid> {
        self.table.read().owner(partition_id)
    }

    /// Maps serialized key bytes to a partition id.
    pub fn partition_id_for_key(&self, key: &[u8]) -> Result<i32> {
        let count = self.partition_count();
        if count <= 0 {
            return Err(HazelcastError::IllegalState(
                "partition count is not known yet".to_string(),
            ));
        }
        Ok(hash_to_index(compute_partition_hash(key), count))
    }

    /// Drops the partition table after switching clusters.
    ///
    /// The partition count is kept: every cluster the client fails over to
    /// must use the same count.
    pub fn reset(&self) {
        let mut current = self.table.write();
        if !current.is_empty() {
            warn!(version = current.version, "discarding partition table");
        }
        *current = Arc::new(PartitionTable {
            version: -1,
            ..PartitionTable::default()
        });
    }
}

fn hash_to_index(hash: i32, count: i32) -> i32 {
    if hash == i32::MIN {
        0
    } else {
        hash.abs() % count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn service() -> PartitionService {
        PartitionService::new(Arc::new(EventDispatcher::new()))
    }

    #[tokio::test]
    async fn test_newer_version_replaces_table() {
        let service = service();
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();

        assert!(service.apply_partitions_view(
            ConnectionId::from_raw(1),
            1,
            vec![(owner_a, vec![0, 1]), (owner_b, vec![2])],
        ));
        assert_eq!(service.partition_owner(0), Some(owner_a));
        assert_eq!(service.partition_owner(2), Some(owner_b));

        assert!(service.apply_partitions_view(
            ConnectionId::from_raw(1),
            2,
            vec![(owner_b, vec![0])],
        ));
        let table = service.table();
        assert_eq!(table.version(), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.owner(1), None);
    }

    #[tokio::test]
    async fn test_stale_or_equal_version_is_ignored() {
        let service = service();
        let owner = Uuid::new_v4();
        service.apply_partitions_view(ConnectionId::from_raw(1), 5, vec![(owner, vec![0])]);

        let other = Uuid::new_v4();
        assert!(!service.apply_partitions_view(ConnectionId::from_raw(2), 5, vec![(other, vec![0])]));
        assert!(!service.apply_partitions_view(ConnectionId::from_raw(2), 3, vec![(other, vec![0])]));
        assert_eq!(service.partition_owner(0), Some(owner));
        assert_eq!(service.table().source(), Some(ConnectionId::from_raw(1)));
    }

    #[tokio::test]
    async fn test_empty_view_is_ignored() {
        let service = service();
        assert!(!service.apply_partitions_view(ConnectionId::from_raw(1), 9, Vec::new()));
        assert_eq!(service.table().version(), -1);
    }

    #[tokio::test]
    async fn test_update_publishes_event() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(EventKind::PartitionsUpdated, move |e| {
                let _ = tx.send(e);
            })
            .await
            .unwrap();
        let service = PartitionService::new(dispatcher);

        service.apply_partitions_view(ConnectionId::from_raw(1), 7, vec![(Uuid::new_v4(), vec![0])]);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::PartitionsUpdated { version: 7 }));
    }

    #[tokio::test]
    async fn test_partition_count_is_fixed() {
        let service = service();
        assert!(service.partition_id_for_key(b"key").is_err());

        assert!(service.check_and_set_partition_count(271));
        assert!(service.check_and_set_partition_count(271));
        assert!(!service.check_and_set_partition_count(100));
        assert_eq!(service.partition_count(), 271);

        let id = service.partition_id_for_key(b"key").unwrap();
        assert!((0..271).contains(&id));
        assert_eq!(id, service.partition_id_for_key(b"key").unwrap());
    }

    #[tokio::test]
    async fn test_reset_keeps_partition_count() {
        let service = service();
        service.check_and_set_partition_count(3);
        service.apply_partitions_view(ConnectionId::from_raw(1), 1, vec![(Uuid::new_v4(), vec![0])]);

        service.reset();
        assert!(service.table().is_empty());
        assert_eq!(service.partition_count(), 3);
        assert!(service.apply_partitions_view(
            ConnectionId::from_raw(1),
            1,
            vec![(Uuid::new_v4(), vec![0])]
        ));
    }

    #[test]
    fn test_hash_to_index() {
        assert_eq!(hash_to_index(i32::MIN, 271), 0);
        assert_eq!(hash_to_index(-5, 3), 2);
        assert_eq!(hash_to_index(7, 3), 1);
    }
}
