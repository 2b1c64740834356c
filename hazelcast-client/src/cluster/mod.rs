//! Cluster membership and partition ownership views.

mod cluster_service;
mod member;
mod partition_service;

pub use cluster_service::{ClusterService, MemberListSnapshot};
pub use member::{Member, MemberVersion};
pub use partition_service::{PartitionService, PartitionTable};
