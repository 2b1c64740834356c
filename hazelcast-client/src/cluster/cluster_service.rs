//! Member list snapshots and membership change notification.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use hazelcast_core::{HazelcastError, Result};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::Member;
use crate::event::{Event, EventDispatcher};

/// Version reported before any member list has been received.
const NO_VERSION: i32 = -1;

/// An immutable member list together with the version the cluster assigned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberListSnapshot {
    version: i32,
    members: Vec<Member>,
}

impl MemberListSnapshot {
    fn empty() -> Self {
        Self {
            version: NO_VERSION,
            members: Vec::new(),
        }
    }

    /// Returns the member list version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns the members in cluster order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Returns the member with the given UUID.
    pub fn member(&self, uuid: &Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.uuid() == *uuid)
    }
}

/// Tracks cluster membership as a series of wholesale snapshots.
///
/// Readers clone the current `Arc` and never observe a partially applied
/// update.
#[derive(Debug)]
pub struct ClusterService {
    snapshot: RwLock<Arc<MemberListSnapshot>>,
    dispatcher: Arc<EventDispatcher>,
    initial_list: watch::Sender<bool>,
}

impl ClusterService {
    /// Creates a service with an empty member list.
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        let (initial_list, _) = watch::channel(false);
        Self {
            snapshot: RwLock::new(Arc::new(MemberListSnapshot::empty())),
            dispatcher,
            initial_list,
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<MemberListSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Returns the current members.
    pub fn members(&self) -> Vec<Member> {
        self.snapshot().members().to_vec()
    }

    /// Returns the member with the given UUID, if present.
    pub fn member(&self, uuid: &Uuid) -> Option<Member> {
        self.snapshot().member(uuid).cloned()
    }

    /// Returns the number of known members.
    pub fn member_count(&self) -> usize {
        self.snapshot().members().len()
    }

    /// Installs a members view pushed by the cluster.
    ///
    /// Views whose version is not newer than the current one are ignored and
    /// `false` is returned. Otherwise the list is replaced, `MembersRemoved`
    /// and `MembersAdded` are published for the difference, and any caller
    /// waiting for the initial list is released.
    pub fn apply_members_view(&self, version: i32, members: Vec<Member>) -> bool {
        let (removed, added) = {
            let mut current = self.snapshot.write();
            if version <= current.version {
                debug!(
                    version,
                    current = current.version,
                    "ignoring stale members view"
                );
                return false;
            }

            let old_ids: HashSet<Uuid> = current.members.iter().map(Member::uuid).collect();
            let new_ids: HashSet<Uuid> = members.iter().map(Member::uuid).collect();
            let removed: Vec<Member> = current
                .members
                .iter()
                .filter(|m| !new_ids.contains(&m.uuid()))
                .cloned()
                .collect();
            let added: Vec<Member> = members
                .iter()
                .filter(|m| !old_ids.contains(&m.uuid()))
                .cloned()
                .collect();

            *current = Arc::new(MemberListSnapshot { version, members });
            (removed, added)
        };

        info!(
            version,
            added = added.len(),
            removed = removed.len(),
            "members view applied"
        );
        if !removed.is_empty() {
            self.dispatcher.publish(Event::MembersRemoved(removed));
        }
        if !added.is_empty() {
            self.dispatcher.publish(Event::MembersAdded(added));
        }
        self.initial_list.send_replace(true);
        true
    }

    /// Waits until a members view has been applied since the last reset.
    ///
    /// Fails with `IllegalState` when `timeout` elapses first.
    pub async fn wait_initial_member_list(&self, timeout: Duration) -> Result<()> {
        let mut received = self.initial_list.subscribe();
        let outcome = tokio::time::timeout(timeout, received.wait_for(|r| *r))
            .await
            .map(|r| r.map(|_| ()));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(HazelcastError::ClientNotActive(
                "cluster service dropped".to_string(),
            )),
            Err(_) => Err(HazelcastError::IllegalState(format!(
                "could not get initial member list from cluster within {:?}",
                timeout
            ))),
        }
    }

    /// Forgets the member list version so the next view from a reconnected
    /// cluster is accepted. Members are kept, so an unchanged view publishes
    /// no membership events.
    pub fn clear_member_list_version(&self) {
        let mut current = self.snapshot.write();
        *current = Arc::new(MemberListSnapshot {
            version: NO_VERSION,
            members: current.members.clone(),
        });
        self.initial_list.send_replace(false);
    }

    /// Drops every member after switching to a different cluster.
    ///
    /// The dropped members are published as `MembersRemoved`.
    pub fn reset(&self) {
        let previous = {
            let mut current = self.snapshot.write();
            std::mem::replace(&mut *current, Arc::new(MemberListSnapshot::empty()))
        };
        self.initial_list.send_replace(false);
        if !previous.members.is_empty() {
            self.dispatcher
                .publish(Event::MembersRemoved(previous.members.clone()));
        }
    }
}
