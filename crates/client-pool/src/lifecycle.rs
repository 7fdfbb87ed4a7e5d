//! Connection lifecycle traits implemented by pool collaborators.
//!
//! The pool is generic over the thing it pools. Anything expensive to create
//! and reusable across checkouts (an API client, a model handle, a database
//! session) participates by implementing [`ConnectionLifecycle`], and a
//! matching [`ConnectionFactory`] builds fresh instances from
//! [`ConnectParams`].

use async_trait::async_trait;

use crate::config::ConnectParams;
use crate::error::PoolError;

/// Capability surface the pool requires from a pooled connection.
///
/// This enumerates the full proxied surface explicitly rather than forwarding
/// arbitrary calls: every method here is reachable through a checked-out
/// [`PooledConnection`](crate::PooledConnection), except that reconfiguration
/// is intercepted (see
/// [`PooledConnection::apply_params`](crate::PooledConnection::apply_params)).
///
/// Timeouts for the I/O-shaped methods are the implementor's responsibility;
/// the pool itself never imposes one.
#[async_trait]
pub trait ConnectionLifecycle: Send + 'static {
    /// Cheap liveness check. Must not perform I/O.
    fn is_connected(&self) -> bool;

    /// Apply connection parameters. Takes effect on the next
    /// [`reconnect`](ConnectionLifecycle::reconnect).
    fn apply_params(&mut self, params: &ConnectParams) -> Result<(), PoolError>;

    /// Re-establish liveness using the last-applied parameters.
    ///
    /// Fails with [`PoolError::Interface`] when the remote service is
    /// unreachable.
    async fn reconnect(&mut self) -> Result<(), PoolError>;

    /// Release underlying resources. Must tolerate an already-closed state.
    async fn disconnect(&mut self) -> Result<(), PoolError>;

    /// Clear any per-checkout server-side session state.
    async fn reset_session(&mut self) -> Result<(), PoolError>;

    /// Optional capability negotiation hook.
    async fn server_version(&mut self) -> Result<String, PoolError> {
        Err(PoolError::NotSupported(
            "server_version is not implemented by this connection".to_string(),
        ))
    }
}

/// Builds connections from opaque parameters.
///
/// Retry and backoff against the remote service belong to the factory, not
/// the pool: a failed [`connect`](ConnectionFactory::connect) surfaces to the
/// caller as-is.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The connection type this factory produces.
    type Connection: ConnectionLifecycle;

    /// Establish a new connection.
    ///
    /// Fails with [`PoolError::Interface`] on inability to connect.
    async fn connect(&self, params: &ConnectParams) -> Result<Self::Connection, PoolError>;
}
