//! Bounded, named connection pool.
//!
//! A [`Pool`] owns a FIFO queue of idle connections plus the active
//! [`PoolConfig`]. Checkout is non-blocking by design: an empty queue is an
//! immediate [`PoolError::Exhausted`], never a wait. Callers that want
//! backpressure build retry on top.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::config::{ConfigVersion, ConnectParams, PoolConfig};
use crate::error::PoolError;
use crate::lifecycle::{ConnectionFactory, ConnectionLifecycle};

/// Smallest allowed pool capacity.
pub const MIN_CAPACITY: usize = 1;

/// Largest allowed pool capacity.
pub const MAX_CAPACITY: usize = 32;

/// Longest allowed pool name.
pub const MAX_NAME_LEN: usize = 64;

static POOL_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._:*$#-]+$").unwrap());

/// Validate a pool name against the allowed character set and length.
fn validate_pool_name(name: &str) -> Result<(), PoolError> {
    if name.len() > MAX_NAME_LEN {
        return Err(PoolError::Validation(format!(
            "pool name is {} characters, maximum is {MAX_NAME_LEN}",
            name.len()
        )));
    }
    if !POOL_NAME_RE.is_match(name) {
        return Err(PoolError::Validation(format!(
            "invalid pool name {name:?}: allowed characters are A-Z a-z 0-9 . _ : - * $ #"
        )));
    }
    Ok(())
}

/// An idle-queue entry: the connection plus its pool-side bookkeeping.
pub(crate) struct IdleEntry<C> {
    pub(crate) conn: C,
    /// Configuration version the connection was last connected under.
    pub(crate) stamped: ConfigVersion,
    /// Session reset was deferred when the connection was returned.
    pub(crate) needs_reset: bool,
}

struct PoolState<C> {
    config: Option<Arc<PoolConfig>>,
    idle: VecDeque<IdleEntry<C>>,
    checked_out: usize,
    next_version: u64,
}

pub(crate) struct PoolInner<F: ConnectionFactory> {
    name: String,
    capacity: usize,
    reset_on_release: bool,
    factory: Arc<F>,
    state: Mutex<PoolState<F::Connection>>,
}

impl<F: ConnectionFactory> PoolInner<F> {
    /// Return a connection to the idle queue.
    ///
    /// Capacity is guaranteed available because the entry came out of this
    /// queue; a full queue here means the capacity invariant was broken
    /// elsewhere and is reported, never silently dropped.
    fn release(&self, entry: IdleEntry<F::Connection>) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        if state.idle.len() >= self.capacity {
            drop(state);
            tracing::error!(
                pool = %self.name,
                capacity = self.capacity,
                "idle queue full on release; capacity invariant violated"
            );
            return Err(PoolError::QueueFull {
                pool: self.name.clone(),
                capacity: self.capacity,
            });
        }
        state.idle.push_back(entry);
        tracing::debug!(pool = %self.name, "connection returned to pool");
        Ok(())
    }

    /// Annotate a checkout-path failure with pool context.
    ///
    /// Only `Interface` errors are rewrapped; collaborator-reported
    /// `Programming`/`NotSupported` errors pass through unchanged.
    fn annotate(&self, context: &str, err: PoolError) -> PoolError {
        match err {
            PoolError::Interface(msg) => {
                PoolError::Interface(format!("{context} for pool {:?}: {msg}", self.name))
            }
            other => other,
        }
    }
}

/// A named, size-bounded pool of reusable connections.
///
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
/// Each pool owns its idle queue and lock, so unrelated pools never contend.
///
/// # Example
///
/// ```rust,ignore
/// use client_pool::{ConnectParams, Pool};
///
/// let pool = Pool::new("inference", 8, true, factory)?;
/// pool.set_config(ConnectParams::new().set("host", "inference.internal")).await?;
/// pool.add_connection(None).await?;
///
/// let conn = pool.acquire().await?;
/// // use the connection; it returns to the pool when dropped
/// ```
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create an unconfigured pool.
    ///
    /// The name must match `[A-Za-z0-9._:*$#-]+` and be at most
    /// [`MAX_NAME_LEN`] characters; capacity must lie in
    /// [`MIN_CAPACITY`]..=[`MAX_CAPACITY`]. Violations fail with
    /// [`PoolError::Validation`].
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        reset_on_release: bool,
        factory: Arc<F>,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        validate_pool_name(&name)?;
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(PoolError::Validation(format!(
                "capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY}, got {capacity}"
            )));
        }

        tracing::info!(pool = %name, capacity, reset_on_release, "pool created");

        Ok(Self {
            inner: Arc::new(PoolInner {
                name,
                capacity,
                reset_on_release,
                factory,
                state: Mutex::new(PoolState {
                    config: None,
                    idle: VecDeque::with_capacity(capacity),
                    checked_out: 0,
                    next_version: 0,
                }),
            }),
        })
    }

    /// The pool's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The pool's fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Whether sessions are reset when connections return to the pool.
    #[must_use]
    pub fn reset_on_release(&self) -> bool {
        self.inner.reset_on_release
    }

    /// Whether a configuration has been installed.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.state.lock().config.is_some()
    }

    /// The version token of the active configuration, if any.
    #[must_use]
    pub fn current_version(&self) -> Option<ConfigVersion> {
        self.inner.state.lock().config.as_ref().map(|c| c.version())
    }

    /// Install a new configuration, replacing the previous one wholesale.
    ///
    /// The candidate parameters are validated by opening (and immediately
    /// closing) a trial connection through the factory. On trial failure the
    /// call fails with [`PoolError::InvalidConfig`] and the previous
    /// configuration and version are untouched. On success the pool's
    /// version counter advances, so connections stamped with the old version
    /// are reconfigured and reconnected at their next checkout.
    pub async fn set_config(&self, params: ConnectParams) -> Result<ConfigVersion, PoolError> {
        let mut trial =
            self.inner
                .factory
                .connect(&params)
                .await
                .map_err(|source| PoolError::InvalidConfig {
                    pool: self.inner.name.clone(),
                    source: Box::new(source),
                })?;
        if let Err(error) = trial.disconnect().await {
            tracing::warn!(pool = %self.inner.name, error = %error, "trial connection disconnect failed");
        }

        let version = {
            let mut state = self.inner.state.lock();
            state.next_version += 1;
            let version = ConfigVersion::new(state.next_version);
            state.config = Some(Arc::new(PoolConfig::new(params, version)));
            version
        };

        tracing::info!(pool = %self.inner.name, version = %version, "pool configuration installed");
        Ok(version)
    }

    /// Add a connection to the idle queue.
    ///
    /// With `existing = None` a fresh connection is built by the factory from
    /// the active configuration. Requires a configuration
    /// ([`PoolError::NoConfig`]) and a free queue slot
    /// ([`PoolError::QueueFull`]). The enqueued connection is stamped with
    /// the configuration version current at admission.
    pub async fn add_connection(&self, existing: Option<F::Connection>) -> Result<(), PoolError> {
        let config = {
            let state = self.inner.state.lock();
            let config = state.config.clone().ok_or_else(|| PoolError::NoConfig {
                pool: self.inner.name.clone(),
            })?;
            if state.idle.len() >= self.inner.capacity {
                return Err(self.queue_full());
            }
            config
        };

        let conn = match existing {
            Some(conn) => conn,
            None => self.inner.factory.connect(config.params()).await?,
        };
        let entry = IdleEntry {
            conn,
            stamped: config.version(),
            needs_reset: false,
        };

        let raced_out = {
            let mut state = self.inner.state.lock();
            if state.idle.len() >= self.inner.capacity {
                Some(entry)
            } else {
                state.idle.push_back(entry);
                None
            }
        };
        if let Some(mut entry) = raced_out {
            // another caller filled the queue while we were connecting
            if let Err(error) = entry.conn.disconnect().await {
                tracing::debug!(pool = %self.inner.name, error = %error, "disconnect of raced-out connection failed");
            }
            return Err(self.queue_full());
        }

        tracing::debug!(pool = %self.inner.name, "connection added to idle queue");
        Ok(())
    }

    /// Check out the oldest idle connection.
    ///
    /// Never waits: an empty queue fails immediately with
    /// [`PoolError::Exhausted`]. A connection that is dead or stamped with a
    /// stale configuration version is reconfigured and reconnected before
    /// handout; if that repair fails the connection goes back onto the idle
    /// queue and the error is surfaced, so no connection is ever lost on an
    /// error path.
    pub async fn acquire(&self) -> Result<PooledConnection<F>, PoolError> {
        let (mut entry, config) = {
            let mut state = self.inner.state.lock();
            let entry = state.idle.pop_front().ok_or_else(|| PoolError::Exhausted {
                pool: self.inner.name.clone(),
            })?;
            let Some(config) = state.config.clone() else {
                // entries cannot be admitted without a configuration
                state.idle.push_front(entry);
                return Err(PoolError::NoConfig {
                    pool: self.inner.name.clone(),
                });
            };
            (entry, config)
        };

        if !entry.conn.is_connected() || entry.stamped != config.version() {
            tracing::debug!(
                pool = %self.inner.name,
                stamped = %entry.stamped,
                current = %config.version(),
                "repairing connection before checkout"
            );
            let repaired = match entry.conn.apply_params(config.params()) {
                Ok(()) => entry.conn.reconnect().await,
                Err(e) => Err(e),
            };
            if let Err(e) = repaired {
                self.inner.state.lock().idle.push_back(entry);
                return Err(self.inner.annotate("reconnect failed", e));
            }
            entry.stamped = config.version();
            entry.needs_reset = false;
        } else if entry.needs_reset {
            if let Err(e) = entry.conn.reset_session().await {
                self.inner.state.lock().idle.push_back(entry);
                return Err(self.inner.annotate("deferred session reset failed", e));
            }
            entry.needs_reset = false;
        }

        self.inner.state.lock().checked_out += 1;
        tracing::debug!(pool = %self.inner.name, version = %entry.stamped, "connection checked out");

        Ok(PooledConnection {
            entry: Some(entry),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Evict and disconnect every idle connection, returning the count.
    ///
    /// Connections currently checked out are untouched. Disconnect errors
    /// are treated as already-closed and ignored.
    pub async fn remove_connections(&self) -> usize {
        let drained: Vec<IdleEntry<F::Connection>> = {
            let mut state = self.inner.state.lock();
            state.idle.drain(..).collect()
        };
        let count = drained.len();
        for mut entry in drained {
            if let Err(error) = entry.conn.disconnect().await {
                tracing::debug!(pool = %self.inner.name, error = %error, "disconnect during eviction failed");
            }
        }
        if count > 0 {
            tracing::info!(pool = %self.inner.name, evicted = count, "idle connections evicted");
        }
        count
    }

    /// A snapshot of the pool's occupancy.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            checked_out: state.checked_out,
            capacity: self.inner.capacity,
        }
    }

    fn queue_full(&self) -> PoolError {
        PoolError::QueueFull {
            pool: self.inner.name.clone(),
            capacity: self.inner.capacity,
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("idle", &status.idle)
            .field("checked_out", &status.checked_out)
            .finish()
    }
}

/// Point-in-time occupancy of a pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Idle connections waiting in the queue.
    pub idle: usize,
    /// Connections currently checked out.
    pub checked_out: usize,
    /// Fixed pool capacity.
    pub capacity: usize,
}

impl PoolStatus {
    /// Checked-out share of capacity, as a percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.checked_out as f64 / self.capacity as f64) * 100.0
    }
}

/// A connection checked out of a [`Pool`].
///
/// Dereferences to the wrapped connection so the full capability surface is
/// available, except that [`apply_params`](PooledConnection::apply_params) is
/// intercepted: pooled connections are reconfigured only through
/// [`Pool::set_config`].
///
/// Dropping the handle returns the connection to its origin pool. The
/// explicit async [`close`](PooledConnection::close) additionally resets the
/// session eagerly (when the pool was built with `reset_on_release`); a
/// plain drop defers that reset to the connection's next checkout. Closing
/// twice is a silent no-op.
pub struct PooledConnection<F: ConnectionFactory> {
    entry: Option<IdleEntry<F::Connection>>,
    pool: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    /// Return the connection to its origin pool.
    ///
    /// Resets the session first when the pool was built with
    /// `reset_on_release`. The connection is returned even if the reset
    /// fails; the reset error is then surfaced after the return and the
    /// reset retried at the next checkout. Calling `close` on an
    /// already-closed handle is a no-op.
    pub async fn close(&mut self) -> Result<(), PoolError> {
        let Some(mut entry) = self.entry.take() else {
            return Ok(());
        };

        let mut reset_failure = None;
        if self.pool.reset_on_release {
            match entry.conn.reset_session().await {
                Ok(()) => entry.needs_reset = false,
                Err(error) => {
                    tracing::warn!(
                        pool = %self.pool.name,
                        error = %error,
                        "session reset on close failed; deferred to next checkout"
                    );
                    entry.needs_reset = true;
                    reset_failure = Some(error);
                }
            }
        }
        self.pool.release(entry)?;

        match reset_failure {
            Some(error) => Err(self.pool.annotate("session reset on close failed", error)),
            None => Ok(()),
        }
    }

    /// Take the connection out of pool custody permanently.
    ///
    /// The connection will not be returned to the pool. Returns `None` if the
    /// handle was already closed.
    #[must_use]
    pub fn detach(mut self) -> Option<F::Connection> {
        let entry = self.entry.take()?;
        let mut state = self.pool.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        drop(state);
        tracing::debug!(pool = %self.pool.name, "connection detached from pool");
        Some(entry.conn)
    }

    /// Liveness of the wrapped connection. `false` once the handle is closed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.entry.as_ref().is_some_and(|e| e.conn.is_connected())
    }

    /// Clear per-checkout server-side session state.
    pub async fn reset_session(&mut self) -> Result<(), PoolError> {
        match self.entry.as_mut() {
            Some(entry) => entry.conn.reset_session().await,
            None => Err(PoolError::Programming(
                "connection handle already closed".to_string(),
            )),
        }
    }

    /// Ask the wrapped connection for its server version.
    pub async fn server_version(&mut self) -> Result<String, PoolError> {
        match self.entry.as_mut() {
            Some(entry) => entry.conn.server_version().await,
            None => Err(PoolError::Programming(
                "connection handle already closed".to_string(),
            )),
        }
    }

    /// Always fails: pooled connections are reconfigured through
    /// [`Pool::set_config`], never individually.
    pub fn apply_params(&mut self, _params: &ConnectParams) -> Result<(), PoolError> {
        Err(PoolError::ConfigThroughPoolOnly)
    }

    /// The configuration version the connection is currently stamped with.
    #[must_use]
    pub fn version(&self) -> Option<ConfigVersion> {
        self.entry.as_ref().map(|e| e.stamped)
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    // entry is only None after close()/detach(), when the handle is spent
    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        &self
            .entry
            .as_ref()
            .expect("connection handle already closed")
            .conn
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .entry
            .as_mut()
            .expect("connection handle already closed")
            .conn
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        entry.needs_reset = self.pool.reset_on_release;
        if let Err(error) = self.pool.release(entry) {
            tracing::error!(
                pool = %self.pool.name,
                error = %error,
                "failed to return connection to pool on drop"
            );
        }
    }
}
