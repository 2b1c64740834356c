//! Correlation table for in-flight requests and listener registrations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use hazelcast_core::protocol::decode_server_error;
use hazelcast_core::{ClientMessage, HazelcastError, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::{Invocation, InvocationFuture, InvocationRouter, InvocationTarget, MessageHandler};
use crate::config::InvocationConfig;
use crate::connection::{Connection, ConnectionId};

struct PendingInvocation {
    sender: oneshot::Sender<Result<ClientMessage>>,
    connection: ConnectionId,
}

/// Matches responses to the requests that caused them.
///
/// Every request gets a fresh correlation id from a per-service counter.
/// Pending invocations are removed exactly once: when their response
/// arrives, when their connection closes, or at shutdown. The service never
/// retries on its own; callers consult [`InvocationService::can_retry`].
pub struct InvocationService {
    next_correlation_id: AtomicI64,
    pending: Mutex<HashMap<i64, PendingInvocation>>,
    event_handlers: Mutex<HashMap<i64, MessageHandler>>,
    router: OnceLock<Arc<dyn InvocationRouter>>,
    invocation_timeout: Duration,
    redo_operation: bool,
    active: AtomicBool,
}

impl InvocationService {
    /// Creates a service with no router installed.
    pub fn new(config: &InvocationConfig) -> Self {
        Self {
            next_correlation_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            event_handlers: Mutex::new(HashMap::new()),
            router: OnceLock::new(),
            invocation_timeout: config.invocation_timeout(),
            redo_operation: config.redo_operation(),
            active: AtomicBool::new(true),
        }
    }

    /// Installs the routing strategy. Only the first call has an effect.
    pub fn set_router(&self, router: Arc<dyn InvocationRouter>) -> Result<()> {
        self.router
            .set(router)
            .map_err(|_| HazelcastError::IllegalState("router is already installed".to_string()))
    }

    /// Sends an invocation and returns a future for its response.
    ///
    /// Routing or enqueue failures resolve the returned future immediately.
    pub async fn send(&self, invocation: Invocation) -> InvocationFuture {
        let connection = self.route(&invocation.target);
        self.send_to(connection, invocation).await
    }

    /// Sends an invocation on `connection` without consulting the router.
    ///
    /// Used for the handshake, before the connection is registered.
    pub async fn send_on(
        &self,
        connection: &Arc<Connection>,
        invocation: Invocation,
    ) -> InvocationFuture {
        let connection = if self.is_active() {
            Ok(Arc::clone(connection))
        } else {
            Err(HazelcastError::ClientNotActive(
                "invocation service is shut down".to_string(),
            ))
        };
        self.send_to(connection, invocation).await
    }

    async fn send_to(
        &self,
        connection: Result<Arc<Connection>>,
        mut invocation: Invocation,
    ) -> InvocationFuture {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        invocation.request.set_correlation_id(correlation_id);

        let (sender, receiver) = oneshot::channel();
        let future = InvocationFuture {
            correlation_id,
            timeout: invocation.timeout.unwrap_or(self.invocation_timeout),
            retryable: invocation.retryable,
            receiver,
        };

        let connection = match connection {
            Ok(connection) => connection,
            Err(err) => {
                debug!(correlation_id, target = ?invocation.target, error = %err, "routing failed");
                let _ = sender.send(Err(err));
                return future;
            }
        };

        if let Some(handler) = invocation.event_handler.take() {
            self.event_handlers.lock().insert(correlation_id, handler);
        }
        self.pending.lock().insert(
            correlation_id,
            PendingInvocation {
                sender,
                connection: connection.id(),
            },
        );

        trace!(correlation_id, connection = %connection.id(), "sending invocation");
        if let Err(err) = connection.write(invocation.request).await {
            self.event_handlers.lock().remove(&correlation_id);
            if let Some(pending) = self.pending.lock().remove(&correlation_id) {
                let _ = pending.sender.send(Err(err));
            }
        }
        future
    }

    /// Sends an invocation and waits for its response.
    pub async fn invoke(&self, invocation: Invocation) -> Result<ClientMessage> {
        self.send(invocation).await.wait().await
    }

    /// Sends an invocation on `connection` and waits for its response.
    pub async fn invoke_on(
        &self,
        connection: &Arc<Connection>,
        invocation: Invocation,
    ) -> Result<ClientMessage> {
        self.send_on(connection, invocation).await.wait().await
    }

    fn route(&self, target: &InvocationTarget) -> Result<Arc<Connection>> {
        if !self.is_active() {
            return Err(HazelcastError::ClientNotActive(
                "invocation service is shut down".to_string(),
            ));
        }
        let router = self.router.get().ok_or_else(|| {
            HazelcastError::IllegalState("no router installed".to_string())
        })?;
        router.route(target)
    }

    /// Delivers a message read from a connection.
    ///
    /// Event messages go to the handler registered under their correlation
    /// id, which stays registered. Other messages resolve and remove the
    /// matching pending invocation; server exceptions resolve it with a
    /// decoded error. Unmatched messages are dropped.
    pub fn handle_response(&self, message: ClientMessage) {
        let Some(correlation_id) = message.correlation_id() else {
            warn!("dropping message without a header");
            return;
        };

        if message.is_event() {
            let handler = self.event_handlers.lock().get(&correlation_id).cloned();
            match handler {
                Some(handler) => handler(message),
                None => trace!(correlation_id, "no handler for event, dropped"),
            }
            return;
        }

        let Some(pending) = self.pending.lock().remove(&correlation_id) else {
            trace!(correlation_id, "no pending invocation for response, dropped");
            return;
        };

        let result = if message.is_exception() {
            match decode_server_error(&message) {
                Ok(server_error) => Err(HazelcastError::from(server_error)),
                Err(err) => Err(err),
            }
        } else {
            Ok(message)
        };
        let _ = pending.sender.send(result);
    }

    /// Removes an event handler. Returns false if none was registered.
    pub fn remove_event_handler(&self, correlation_id: i64) -> bool {
        self.event_handlers.lock().remove(&correlation_id).is_some()
    }

    /// Fails every invocation pending on a connection with `TargetDisconnected`.
    pub fn fail_connection(&self, connection: ConnectionId, reason: &str) {
        let failed: Vec<(i64, PendingInvocation)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<i64> = pending
                .iter()
                .filter(|(_, p)| p.connection == connection)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|p| (id, p)))
                .collect()
        };

        if !failed.is_empty() {
            debug!(%connection, count = failed.len(), "failing pending invocations");
        }
        for (_, pending) in failed {
            let _ = pending
                .sender
                .send(Err(HazelcastError::TargetDisconnected(reason.to_string())));
        }
    }

    /// Decides whether an invocation that failed with `err` may be resent.
    pub fn can_retry(&self, err: &HazelcastError, retryable: bool) -> bool {
        match err {
            HazelcastError::NonRetryable(_) => false,
            HazelcastError::Connection(_)
            | HazelcastError::Io(_)
            | HazelcastError::InstanceNotActive(_) => true,
            HazelcastError::Server(server_error) => server_error.is_retryable(),
            HazelcastError::TargetDisconnected(_) => retryable || self.redo_operation,
            _ => false,
        }
    }

    /// Stops accepting invocations and fails every pending one with
    /// `ClientNotActive`. Event handlers are dropped.
    pub fn shutdown(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let pending: Vec<PendingInvocation> = self.pending.lock().drain().map(|(_, p)| p).collect();
        self.event_handlers.lock().clear();
        debug!(count = pending.len(), "invocation service shut down");
        for invocation in pending {
            let _ = invocation.sender.send(Err(HazelcastError::ClientNotActive(
                "client is shutting down".to_string(),
            )));
        }
    }

    /// Returns true until [`InvocationService::shutdown`] is called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns the number of invocations awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the number of registered event handlers.
    pub fn event_handler_count(&self) -> usize {
        self.event_handlers.lock().len()
    }
}

impl std::fmt::Debug for InvocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationService")
            .field("pending", &self.pending_count())
            .field("event_handlers", &self.event_handler_count())
            .field("redo_operation", &self.redo_operation)
            .field("active", &self.is_active())
            .finish()
    }
}
