//! Cluster member discovery mechanisms.

use async_trait::async_trait;
use hazelcast_core::{Address, Result};

/// Trait for discovering Hazelcast cluster member addresses.
#[async_trait]
pub trait ClusterDiscovery: Send + Sync + std::fmt::Debug {
    /// Discovers candidate member addresses, in the order they should be tried.
    async fn discover(&self) -> Result<Vec<Address>>;
}

/// Static address discovery using a pre-configured list of addresses.
#[derive(Debug, Clone)]
pub struct StaticAddressDiscovery {
    addresses: Vec<Address>,
}

impl StaticAddressDiscovery {
    /// Creates a new static discovery with the given addresses.
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    /// Returns the configured addresses.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }
}

#[async_trait]
impl ClusterDiscovery for StaticAddressDiscovery {
    async fn discover(&self) -> Result<Vec<Address>> {
        Ok(self.addresses.clone())
    }
}

impl<T> From<T> for StaticAddressDiscovery
where
    T: IntoIterator<Item = Address>,
{
    fn from(addresses: T) -> Self {
        Self::new(addresses.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_discovery_preserves_order() {
        let first = Address::new("192.168.1.1", 5701);
        let second = Address::new("192.168.1.2", 5701);

        let discovery = StaticAddressDiscovery::new(vec![first.clone(), second.clone()]);
        let result = discovery.discover().await.unwrap();

        assert_eq!(result, vec![first, second]);
    }

    #[tokio::test]
    async fn test_static_discovery_empty_addresses() {
        let discovery = StaticAddressDiscovery::new(vec![]);
        assert!(discovery.discover().await.unwrap().is_empty());
    }

    #[test]
    fn test_static_discovery_from_array() {
        let discovery: StaticAddressDiscovery = [
            Address::new("10.0.0.1", 5701),
            Address::new("10.0.0.2", 5701),
        ]
        .into();
        assert_eq!(discovery.addresses().len(), 2);
    }

    #[test]
    fn test_static_discovery_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StaticAddressDiscovery>();
    }
}
