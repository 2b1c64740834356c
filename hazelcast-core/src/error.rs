//! Error types for Hazelcast operations.

use std::fmt;
use std::io;
use thiserror::Error;

/// Fully qualified class names of server-side exceptions that are safe to retry.
const RETRYABLE_SERVER_EXCEPTIONS: &[&str] = &[
    "com.hazelcast.spi.exception.RetryableHazelcastException",
    "com.hazelcast.spi.exception.RetryableIOException",
    "com.hazelcast.spi.exception.TargetNotMemberException",
    "com.hazelcast.spi.exception.CallerNotMemberException",
    "com.hazelcast.spi.exception.WrongTargetException",
    "com.hazelcast.spi.exception.PartitionMigratingException",
    "com.hazelcast.core.MemberLeftException",
    "com.hazelcast.core.HazelcastInstanceNotActiveException",
];

/// Server class name reported when the remote instance is shutting down.
pub const INSTANCE_NOT_ACTIVE_EXCEPTION: &str =
    "com.hazelcast.core.HazelcastInstanceNotActiveException";

/// A single frame of a server-side stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceElement {
    /// Fully qualified name of the declaring class.
    pub declaring_class: String,
    /// Method name.
    pub method_name: String,
    /// Source file name, if known.
    pub file_name: Option<String>,
    /// Line number, or a negative value if unknown.
    pub line_number: i32,
}

impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({}:{})",
            self.declaring_class,
            self.method_name,
            self.file_name.as_deref().unwrap_or("Unknown Source"),
            self.line_number
        )
    }
}

/// An exception raised on a cluster member and sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Protocol error code.
    pub error_code: i32,
    /// Fully qualified class name of the server exception.
    pub class_name: String,
    /// Exception message, if any.
    pub message: Option<String>,
    /// Server-side stack trace.
    pub stack_trace: Vec<StackTraceElement>,
    /// Causes reported after the top-level exception, outermost first.
    pub causes: Vec<ServerError>,
}

impl ServerError {
    /// Creates a server error without a stack trace.
    pub fn new(error_code: i32, class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            error_code,
            class_name: class_name.into(),
            message,
            stack_trace: Vec::new(),
            causes: Vec::new(),
        }
    }

    /// Returns true if the server marks this exception class as retryable.
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_SERVER_EXCEPTIONS.contains(&self.class_name.as_str())
    }

    /// Returns true if the remote instance reported that it is not active.
    pub fn is_instance_not_active(&self) -> bool {
        self.class_name == INSTANCE_NOT_ACTIVE_EXCEPTION
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

/// The main error type for Hazelcast operations.
#[derive(Debug, Error)]
pub enum HazelcastError {
    /// Connection-related errors (network failures, unreachable members).
    #[error("connection error: {0}")]
    Connection(String),

    /// The connection carrying an invocation was closed before a response arrived.
    #[error("target disconnected: {0}")]
    TargetDisconnected(String),

    /// The member rejected the configured credentials.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The member uses an incompatible serialization version.
    #[error("serialization version mismatch: {0}")]
    SerializationVersionMismatch(String),

    /// The member does not allow this client to join its cluster.
    #[error("client not allowed in cluster: {0}")]
    NotAllowedInCluster(String),

    /// The client or cluster is in a state that does not allow the operation.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The local client has been shut down.
    #[error("client not active: {0}")]
    ClientNotActive(String),

    /// The remote instance is shutting down.
    #[error("instance not active: {0}")]
    InstanceNotActive(String),

    /// An exception decoded from a server response.
    #[error("server error: {0}")]
    Server(ServerError),

    /// Protocol-related errors (invalid messages, unsupported versions).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation timeout errors.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// The caller cancelled the operation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error that must not be retried, whatever its inner kind.
    #[error("{0}")]
    NonRetryable(Box<HazelcastError>),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HazelcastError {
    /// Wraps this error so that retry policies give up on it.
    pub fn non_retryable(self) -> Self {
        match self {
            wrapped @ HazelcastError::NonRetryable(_) => wrapped,
            other => HazelcastError::NonRetryable(Box::new(other)),
        }
    }

    /// Returns true if no retry policy may retry this error.
    ///
    /// Authentication outcomes are terminal even when not explicitly wrapped.
    pub fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            HazelcastError::NonRetryable(_)
                | HazelcastError::Authentication(_)
                | HazelcastError::SerializationVersionMismatch(_)
                | HazelcastError::NotAllowedInCluster(_)
                | HazelcastError::ClientNotActive(_)
                | HazelcastError::Cancelled(_)
        )
    }

    /// Returns true for transport-level failures.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, HazelcastError::Connection(_) | HazelcastError::Io(_))
    }

    /// Returns the innermost error, looking through `NonRetryable` wrappers.
    pub fn root(&self) -> &HazelcastError {
        match self {
            HazelcastError::NonRetryable(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<ServerError> for HazelcastError {
    fn from(error: ServerError) -> Self {
        if error.is_instance_not_active() {
            HazelcastError::InstanceNotActive(error.message.clone().unwrap_or_default())
        } else {
            HazelcastError::Server(error)
        }
    }
}

/// A specialized `Result` type for Hazelcast operations.
pub type Result<T> = std::result::Result<T, HazelcastError>;
