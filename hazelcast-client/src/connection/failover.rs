//! Ordered list of candidate clusters tried on connect failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hazelcast_core::{HazelcastError, Result};

use crate::config::{ClientConfig, ClientFailoverConfig};

use super::discovery::{ClusterDiscovery, StaticAddressDiscovery};

/// One failover target: where to find it and how to talk to it.
#[derive(Debug, Clone)]
pub struct CandidateCluster {
    config: ClientConfig,
    discovery: Arc<dyn ClusterDiscovery>,
}

impl CandidateCluster {
    /// Creates a candidate that discovers members from the configured addresses.
    pub fn from_config(config: ClientConfig) -> Self {
        let discovery = StaticAddressDiscovery::new(config.network().addresses().to_vec());
        Self::with_discovery(config, Arc::new(discovery))
    }

    /// Creates a candidate with a custom discovery source.
    pub fn with_discovery(config: ClientConfig, discovery: Arc<dyn ClusterDiscovery>) -> Self {
        Self { config, discovery }
    }

    /// Returns the cluster name sent during authentication.
    pub fn cluster_name(&self) -> &str {
        self.config.cluster_name()
    }

    /// Returns the full configuration: credentials, timeouts and retry schedule.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the discovery source for seed addresses.
    pub fn discovery(&self) -> &Arc<dyn ClusterDiscovery> {
        &self.discovery
    }
}

/// Holds the candidate clusters and which one is current.
///
/// The current index only moves through [`FailoverService::next`], so a
/// cluster that authenticated successfully stays current until the manager
/// gives up on it.
#[derive(Debug)]
pub struct FailoverService {
    candidates: Vec<CandidateCluster>,
    current: AtomicUsize,
    try_count: u32,
}

impl FailoverService {
    /// Creates a service from an already validated failover configuration.
    pub fn new(config: &ClientFailoverConfig) -> Self {
        let candidates = config
            .client_configs()
            .iter()
            .cloned()
            .map(CandidateCluster::from_config)
            .collect();
        Self::from_parts(candidates, config.try_count())
    }

    /// Creates a service from explicit candidates.
    ///
    /// Fails with `Configuration` when `candidates` is empty.
    pub fn with_candidates(candidates: Vec<CandidateCluster>, try_count: u32) -> Result<Self> {
        if candidates.is_empty() {
            return Err(HazelcastError::Configuration(
                "failover requires at least one candidate cluster".to_string(),
            ));
        }
        Ok(Self::from_parts(candidates, try_count))
    }

    fn from_parts(candidates: Vec<CandidateCluster>, try_count: u32) -> Self {
        Self {
            candidates,
            current: AtomicUsize::new(0),
            try_count: try_count.max(1),
        }
    }

    /// Returns the active candidate.
    pub fn current(&self) -> &CandidateCluster {
        &self.candidates[self.current_index()]
    }

    /// Returns the index of the active candidate.
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire) % self.candidates.len()
    }

    /// Advances to the next candidate, wrapping after the last one.
    pub fn next(&self) -> &CandidateCluster {
        let len = self.candidates.len();
        let previous = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_default();
        &self.candidates[(previous + 1) % len]
    }

    /// Returns the number of candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Returns how many passes over all candidates are made.
    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    /// Returns the number of consecutive connect failures tolerated before giving up.
    pub fn max_attempts(&self) -> usize {
        self.candidates.len() * self.try_count as usize
    }
}
