//! Client configuration types and builders.

use std::collections::HashSet;
use std::time::Duration;

use hazelcast_core::Address;

/// Default cluster name.
const DEFAULT_CLUSTER_NAME: &str = "dev";
/// Default member address host.
const DEFAULT_HOST: &str = "127.0.0.1";
/// Default member address port.
const DEFAULT_PORT: u16 = 5701;
/// Default connection timeout.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Default heartbeat interval.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Default heartbeat timeout.
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default period of the level-triggered reconciliation pass.
const DEFAULT_RECONCILIATION_INTERVAL: Duration = Duration::from_secs(1);
/// Default initial retry backoff.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Default maximum retry backoff.
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Default retry multiplier.
const DEFAULT_RETRY_MULTIPLIER: f64 = 1.05;
/// Default jitter factor.
const DEFAULT_JITTER: f64 = 0.0;
/// Default maximum retry attempts per connect pass.
const DEFAULT_MAX_RETRIES: u32 = 10;
/// Default bound on a whole cluster connect pass.
const DEFAULT_CLUSTER_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Default invocation timeout.
const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(120);
/// Default time to wait for the first member list after connecting.
const DEFAULT_INITIAL_MEMBER_LIST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default number of passes over the candidate clusters.
const DEFAULT_FAILOVER_TRY_COUNT: u32 = 3;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for hazelcast_core::HazelcastError {
    fn from(error: ConfigError) -> Self {
        hazelcast_core::HazelcastError::Configuration(error.message)
    }
}

/// Network configuration for cluster connections.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    addresses: Vec<Address>,
    connection_timeout: Duration,
    smart_routing: bool,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    reconciliation_interval: Duration,
}

impl NetworkConfig {
    /// Returns the configured seed addresses.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Returns the timeout for opening a single connection.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Returns true if the client keeps one connection per member.
    pub fn smart_routing(&self) -> bool {
        self.smart_routing
    }

    /// Returns the heartbeat interval duration.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Returns how long a connection may stay silent before it is closed.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Returns the period of the full reconciliation pass.
    pub fn reconciliation_interval(&self) -> Duration {
        self.reconciliation_interval
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            addresses: vec![Address::new(DEFAULT_HOST, DEFAULT_PORT)],
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            smart_routing: true,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            reconciliation_interval: DEFAULT_RECONCILIATION_INTERVAL,
        }
    }
}

/// Builder for `NetworkConfig`.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfigBuilder {
    addresses: Vec<Address>,
    connection_timeout: Option<Duration>,
    smart_routing: Option<bool>,
    heartbeat_interval: Option<Duration>,
    heartbeat_timeout: Option<Duration>,
    reconciliation_interval: Option<Duration>,
}

impl NetworkConfigBuilder {
    /// Creates a new network configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a seed address.
    pub fn add_address(mut self, address: impl Into<Address>) -> Self {
        self.addresses.push(address.into());
        self
    }

    /// Sets the seed addresses, replacing any previously configured.
    pub fn addresses<I, A>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        self.addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the connection timeout duration.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Enables or disables smart routing.
    pub fn smart_routing(mut self, enabled: bool) -> Self {
        self.smart_routing = Some(enabled);
        self
    }

    /// Sets the heartbeat interval duration.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    /// Sets the period of the full reconciliation pass.
    pub fn reconciliation_interval(mut self, interval: Duration) -> Self {
        self.reconciliation_interval = Some(interval);
        self
    }

    /// Builds the network configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any interval is zero or the heartbeat
    /// timeout is not longer than the heartbeat interval.
    pub fn build(self) -> Result<NetworkConfig, ConfigError> {
        let addresses = if self.addresses.is_empty() {
            vec![Address::new(DEFAULT_HOST, DEFAULT_PORT)]
        } else {
            self.addresses
        };

        let heartbeat_interval = self.heartbeat_interval.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL);
        let heartbeat_timeout = self.heartbeat_timeout.unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT);
        let reconciliation_interval = self
            .reconciliation_interval
            .unwrap_or(DEFAULT_RECONCILIATION_INTERVAL);

        if heartbeat_interval.is_zero() || reconciliation_interval.is_zero() {
            return Err(ConfigError::new("intervals must be greater than zero"));
        }
        if heartbeat_timeout <= heartbeat_interval {
            return Err(ConfigError::new(
                "heartbeat_timeout must exceed heartbeat_interval",
            ));
        }

        Ok(NetworkConfig {
            addresses,
            connection_timeout: self.connection_timeout.unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            smart_routing: self.smart_routing.unwrap_or(true),
            heartbeat_interval,
            heartbeat_timeout,
            reconciliation_interval,
        })
    }
}

/// Retry configuration for cluster connect attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: f64,
    max_retries: u32,
    cluster_connect_timeout: Duration,
}

impl RetryConfig {
    /// Returns the initial backoff duration.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Returns the maximum backoff duration.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Returns the backoff multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Returns the jitter factor in `0.0..=1.0`.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns the maximum number of retry attempts.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the overall bound on one connect pass.
    pub fn cluster_connect_timeout(&self) -> Duration {
        self.cluster_connect_timeout
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            max_retries: DEFAULT_MAX_RETRIES,
            cluster_connect_timeout: DEFAULT_CLUSTER_CONNECT_TIMEOUT,
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
    max_retries: Option<u32>,
    cluster_connect_timeout: Option<Duration>,
}

impl RetryConfigBuilder {
    /// Creates a new retry configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial backoff duration.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Sets the jitter factor.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Sets the maximum number of retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the overall bound on one connect pass.
    pub fn cluster_connect_timeout(mut self, timeout: Duration) -> Self {
        self.cluster_connect_timeout = Some(timeout);
        self
    }

    /// Builds the retry configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `initial_backoff` exceeds `max_backoff`
    /// - `multiplier` is less than 1.0
    /// - `jitter` is outside `0.0..=1.0`
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        let initial_backoff = self.initial_backoff.unwrap_or(DEFAULT_INITIAL_BACKOFF);
        let max_backoff = self.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF);
        let multiplier = self.multiplier.unwrap_or(DEFAULT_RETRY_MULTIPLIER);
        let jitter = self.jitter.unwrap_or(DEFAULT_JITTER);

        if initial_backoff > max_backoff {
            return Err(ConfigError::new(
                "initial_backoff must not exceed max_backoff",
            ));
        }

        if multiplier < 1.0 {
            return Err(ConfigError::new("multiplier must be at least 1.0"));
        }

        if !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigError::new("jitter must be between 0.0 and 1.0"));
        }

        Ok(RetryConfig {
            initial_backoff,
            max_backoff,
            multiplier,
            jitter,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            cluster_connect_timeout: self
                .cluster_connect_timeout
                .unwrap_or(DEFAULT_CLUSTER_CONNECT_TIMEOUT),
        })
    }
}

/// Settings applied to every invocation.
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    invocation_timeout: Duration,
    redo_operation: bool,
}

impl InvocationConfig {
    /// Returns the default deadline for a single invocation.
    pub fn invocation_timeout(&self) -> Duration {
        self.invocation_timeout
    }

    /// Returns true if non-idempotent invocations may be retried after a disconnect.
    pub fn redo_operation(&self) -> bool {
        self.redo_operation
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            redo_operation: false,
        }
    }
}

/// Builder for `InvocationConfig`.
#[derive(Debug, Clone, Default)]
pub struct InvocationConfigBuilder {
    invocation_timeout: Option<Duration>,
    redo_operation: Option<bool>,
}

impl InvocationConfigBuilder {
    /// Creates a new invocation configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default deadline for a single invocation.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Allows non-idempotent invocations to be retried after a disconnect.
    pub fn redo_operation(mut self, redo: bool) -> Self {
        self.redo_operation = Some(redo);
        self
    }

    /// Builds the invocation configuration.
    pub fn build(self) -> Result<InvocationConfig, ConfigError> {
        let invocation_timeout = self
            .invocation_timeout
            .unwrap_or(DEFAULT_INVOCATION_TIMEOUT);
        if invocation_timeout.is_zero() {
            return Err(ConfigError::new(
                "invocation_timeout must be greater than zero",
            ));
        }
        Ok(InvocationConfig {
            invocation_timeout,
            redo_operation: self.redo_operation.unwrap_or(false),
        })
    }
}

/// Security configuration for authentication.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    username: Option<String>,
    password: Option<String>,
}

impl SecurityConfig {
    /// Returns the configured username.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the configured password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns true if username/password credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Builder for `SecurityConfig`.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfigBuilder {
    username: Option<String>,
    password: Option<String>,
}

impl SecurityConfigBuilder {
    /// Creates a new security configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password for authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets both username and password for authentication.
    pub fn credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username(username).password(password)
    }

    /// Builds the security configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if only one of `username` or `password` is set.
    pub fn build(self) -> Result<SecurityConfig, ConfigError> {
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::new(
                "both username and password must be provided together",
            ));
        }

        Ok(SecurityConfig {
            username: self.username,
            password: self.password,
        })
    }
}

/// Main client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    cluster_name: String,
    client_name: Option<String>,
    labels: Vec<String>,
    network: NetworkConfig,
    retry: RetryConfig,
    invocation: InvocationConfig,
    security: SecurityConfig,
    initial_member_list_timeout: Duration,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the cluster name.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Returns the client name sent during authentication, if set.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Returns the labels sent during authentication.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Returns the retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the invocation configuration.
    pub fn invocation(&self) -> &InvocationConfig {
        &self.invocation
    }

    /// Returns the security configuration.
    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    /// Returns how long `start` waits for the first member list.
    pub fn initial_member_list_timeout(&self) -> Duration {
        self.initial_member_list_timeout
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            client_name: None,
            labels: Vec::new(),
            network: NetworkConfig::default(),
            retry: RetryConfig::default(),
            invocation: InvocationConfig::default(),
            security: SecurityConfig::default(),
            initial_member_list_timeout: DEFAULT_INITIAL_MEMBER_LIST_TIMEOUT,
        }
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    cluster_name: Option<String>,
    client_name: Option<String>,
    labels: Vec<String>,
    network: NetworkConfigBuilder,
    retry: RetryConfigBuilder,
    invocation: InvocationConfigBuilder,
    security: SecurityConfigBuilder,
    initial_member_list_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster name.
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Sets the client name sent during authentication.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Adds a label sent during authentication.
    pub fn add_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Configures network settings using a builder function.
    pub fn network<F>(mut self, f: F) -> Self
    where
        F: FnOnce(NetworkConfigBuilder) -> NetworkConfigBuilder,
    {
        self.network = f(self.network);
        self
    }

    /// Configures retry settings using a builder function.
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        self.retry = f(self.retry);
        self
    }

    /// Configures invocation settings using a builder function.
    pub fn invocation<F>(mut self, f: F) -> Self
    where
        F: FnOnce(InvocationConfigBuilder) -> InvocationConfigBuilder,
    {
        self.invocation = f(self.invocation);
        self
    }

    /// Configures security settings using a builder function.
    pub fn security<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SecurityConfigBuilder) -> SecurityConfigBuilder,
    {
        self.security = f(self.security);
        self
    }

    /// Adds a seed address.
    pub fn add_address(mut self, address: impl Into<Address>) -> Self {
        self.network = self.network.add_address(address);
        self
    }

    /// Sets the seed addresses.
    pub fn addresses<I, A>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Address>,
    {
        self.network = self.network.addresses(addresses);
        self
    }

    /// Sets the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.network = self.network.connection_timeout(timeout);
        self
    }

    /// Enables or disables smart routing.
    pub fn smart_routing(mut self, enabled: bool) -> Self {
        self.network = self.network.smart_routing(enabled);
        self
    }

    /// Sets credentials for authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.security = self.security.credentials(username, password);
        self
    }

    /// Sets how long `start` waits for the first member list.
    pub fn initial_member_list_timeout(mut self, timeout: Duration) -> Self {
        self.initial_member_list_timeout = Some(timeout);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let cluster_name = self
            .cluster_name
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());

        if cluster_name.is_empty() {
            return Err(ConfigError::new("cluster_name must not be empty"));
        }

        let network = self.network.build()?;
        let retry = self.retry.build()?;
        let invocation = self.invocation.build()?;
        let security = self.security.build()?;

        Ok(ClientConfig {
            cluster_name,
            client_name: self.client_name,
            labels: self.labels,
            network,
            retry,
            invocation,
            security,
            initial_member_list_timeout: self
                .initial_member_list_timeout
                .unwrap_or(DEFAULT_INITIAL_MEMBER_LIST_TIMEOUT),
        })
    }
}

/// Ordered list of alternative clusters tried when the current one is lost.
#[derive(Debug, Clone)]
pub struct ClientFailoverConfig {
    client_configs: Vec<ClientConfig>,
    try_count: u32,
}

impl ClientFailoverConfig {
    /// Creates a new failover configuration builder.
    pub fn builder() -> ClientFailoverConfigBuilder {
        ClientFailoverConfigBuilder::new()
    }

    /// Wraps a single configuration, with the default try count.
    pub fn single(config: ClientConfig) -> Self {
        Self {
            client_configs: vec![config],
            try_count: DEFAULT_FAILOVER_TRY_COUNT,
        }
    }

    /// Returns the candidate configurations in preference order.
    pub fn client_configs(&self) -> &[ClientConfig] {
        &self.client_configs
    }

    /// Returns the configuration at `index`, if any.
    pub fn get_config(&self, index: usize) -> Option<&ClientConfig> {
        self.client_configs.get(index)
    }

    /// Returns the number of candidate clusters.
    pub fn cluster_count(&self) -> usize {
        self.client_configs.len()
    }

    /// Returns how many passes over all candidates are made before giving up.
    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    /// Returns the configuration whose shared settings apply to the client.
    pub fn primary(&self) -> &ClientConfig {
        &self.client_configs[0]
    }
}

/// Builder for `ClientFailoverConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientFailoverConfigBuilder {
    client_configs: Vec<ClientConfig>,
    try_count: Option<u32>,
}

impl ClientFailoverConfigBuilder {
    /// Creates a new failover configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate cluster configuration.
    pub fn add_client_config(mut self, config: ClientConfig) -> Self {
        self.client_configs.push(config);
        self
    }

    /// Sets how many passes over all candidates are made.
    pub fn try_count(mut self, try_count: u32) -> Self {
        self.try_count = Some(try_count);
        self
    }

    /// Builds the failover configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - no client configuration was added
    /// - `try_count` is zero
    /// - candidates disagree on smart routing
    pub fn build(self) -> Result<ClientFailoverConfig, ConfigError> {
        if self.client_configs.is_empty() {
            return Err(ConfigError::new(
                "failover requires at least one client configuration",
            ));
        }

        let try_count = self.try_count.unwrap_or(DEFAULT_FAILOVER_TRY_COUNT);
        if try_count == 0 {
            return Err(ConfigError::new("try_count must be at least 1"));
        }

        let routing: HashSet<bool> = self
            .client_configs
            .iter()
            .map(|c| c.network().smart_routing())
            .collect();
        if routing.len() > 1 {
            return Err(ConfigError::new(
                "all failover configurations must use the same routing mode",
            ));
        }

        Ok(ClientFailoverConfig {
            client_configs: self.client_configs,
            try_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.cluster_name(), "dev");
        assert_eq!(config.network().addresses().len(), 1);
        assert_eq!(
            config.network().addresses()[0],
            Address::new("127.0.0.1", 5701)
        );
        assert!(config.network().smart_routing());
        assert_eq!(
            config.initial_member_list_timeout(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_builder_matches_default() {
        let built = ClientConfig::builder().build().unwrap();
        let default = ClientConfig::default();
        assert_eq!(built.cluster_name(), default.cluster_name());
        assert_eq!(built.network().addresses(), default.network().addresses());
        assert_eq!(
            built.invocation().invocation_timeout(),
            default.invocation().invocation_timeout()
        );
    }

    #[test]
    fn test_builder_empty_cluster_name_fails() {
        let result = ClientConfig::builder().cluster_name("").build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cluster_name must not be empty"));
    }

    #[test]
    fn test_builder_add_address() {
        let socket: SocketAddr = "192.168.1.1:5701".parse().unwrap();

        let config = ClientConfig::builder()
            .add_address(socket)
            .add_address("member-2:5702".parse::<Address>().unwrap())
            .build()
            .unwrap();

        assert_eq!(
            config.network().addresses(),
            &[
                Address::new("192.168.1.1", 5701),
                Address::new("member-2", 5702)
            ]
        );
    }

    #[test]
    fn test_network_config_builder() {
        let config = ClientConfig::builder()
            .network(|n| {
                n.smart_routing(false)
                    .heartbeat_interval(Duration::from_secs(2))
                    .heartbeat_timeout(Duration::from_secs(10))
                    .reconciliation_interval(Duration::from_millis(500))
            })
            .build()
            .unwrap();

        assert!(!config.network().smart_routing());
        assert_eq!(config.network().heartbeat_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.network().reconciliation_interval(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_heartbeat_timeout_must_exceed_interval() {
        let result = NetworkConfigBuilder::new()
            .heartbeat_interval(Duration::from_secs(10))
            .heartbeat_timeout(Duration::from_secs(10))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.max_backoff(), Duration::from_secs(30));
        assert_eq!(config.multiplier(), 1.05);
        assert_eq!(config.cluster_connect_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_retry_validation() {
        assert!(RetryConfigBuilder::new()
            .initial_backoff(Duration::from_secs(60))
            .max_backoff(Duration::from_secs(30))
            .build()
            .is_err());
        assert!(RetryConfigBuilder::new().multiplier(0.5).build().is_err());
        assert!(RetryConfigBuilder::new().jitter(1.5).build().is_err());
        assert!(RetryConfigBuilder::new().jitter(-0.1).build().is_err());
        assert!(RetryConfigBuilder::new().jitter(1.0).build().is_ok());
    }

    #[test]
    fn test_invocation_config() {
        let config = ClientConfig::builder()
            .invocation(|i| {
                i.invocation_timeout(Duration::from_secs(3))
                    .redo_operation(true)
            })
            .build()
            .unwrap();
        assert_eq!(config.invocation().invocation_timeout(), Duration::from_secs(3));
        assert!(config.invocation().redo_operation());

        assert!(InvocationConfigBuilder::new()
            .invocation_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_security_partial_credentials_fails() {
        let result = ClientConfig::builder()
            .security(|s| s.username("admin"))
            .build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("both username and password"));
    }

    #[test]
    fn test_builder_credentials() {
        let config = ClientConfig::builder()
            .credentials("admin", "secret")
            .client_name("orders-service")
            .add_label("blue")
            .build()
            .unwrap();
        assert!(config.security().has_credentials());
        assert_eq!(config.security().username(), Some("admin"));
        assert_eq!(config.client_name(), Some("orders-service"));
        assert_eq!(config.labels(), &["blue".to_string()]);
    }

    #[test]
    fn test_failover_config_builder() {
        let primary = ClientConfig::builder().cluster_name("primary").build().unwrap();
        let backup = ClientConfig::builder().cluster_name("backup").build().unwrap();

        let failover = ClientFailoverConfig::builder()
            .add_client_config(primary)
            .add_client_config(backup)
            .try_count(5)
            .build()
            .unwrap();

        assert_eq!(failover.cluster_count(), 2);
        assert_eq!(failover.try_count(), 5);
        assert_eq!(failover.get_config(1).unwrap().cluster_name(), "backup");
        assert_eq!(failover.primary().cluster_name(), "primary");
    }

    #[test]
    fn test_failover_config_validation() {
        let err = ClientFailoverConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("at least one client configuration"));

        let err = ClientFailoverConfig::builder()
            .add_client_config(ClientConfig::default())
            .try_count(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("try_count must be at least 1"));

        let unisocket = ClientConfig::builder().smart_routing(false).build().unwrap();
        assert!(ClientFailoverConfig::builder()
            .add_client_config(ClientConfig::default())
            .add_client_config(unisocket)
            .build()
            .is_err());
    }

    #[test]
    fn test_failover_default_try_count() {
        let failover = ClientFailoverConfig::single(ClientConfig::default());
        assert_eq!(failover.try_count(), 3);
    }

    #[test]
    fn test_config_error_into_hazelcast_error() {
        let err: hazelcast_core::HazelcastError = ConfigError::new("bad").into();
        assert_eq!(err.to_string(), "configuration error: bad");
    }

    #[test]
    fn test_client_config_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientConfig>();
        assert_send_sync::<ClientFailoverConfig>();
        assert_send_sync::<ConfigError>();
    }
}
