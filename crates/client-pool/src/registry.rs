//! Named pool registry.
//!
//! A [`PoolRegistry`] maps pool names to pools and guarantees at most one
//! pool per name. It is an explicit service object rather than ambient
//! global state; applications wanting a process-wide registry wrap one in a
//! `once_cell` static:
//!
//! ```rust,ignore
//! use client_pool::PoolRegistry;
//! use once_cell::sync::Lazy;
//!
//! static POOLS: Lazy<PoolRegistry<HttpClientFactory>> =
//!     Lazy::new(|| PoolRegistry::new(HttpClientFactory::default()));
//! ```
//!
//! Registry lifetime equals its owner's lifetime; entries are never removed
//! implicitly, only by an explicit [`shutdown`](PoolRegistry::shutdown).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ConnectParams;
use crate::error::PoolError;
use crate::lifecycle::ConnectionFactory;
use crate::pool::{Pool, PooledConnection};

/// Process-wide map from pool name to [`Pool`], one pool per name.
///
/// All pools created through a registry share its connection factory.
/// Lookup-or-insert happens in a single critical section with no I/O inside
/// it, so two pools with the same name can never coexist.
pub struct PoolRegistry<F: ConnectionFactory> {
    factory: Arc<F>,
    pools: Mutex<HashMap<String, Pool<F>>>,
}

impl<F: ConnectionFactory> PoolRegistry<F> {
    /// Create an empty registry around a connection factory.
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the pool registered under `name`, or create and register it.
    ///
    /// An existing pool is returned as-is after verifying that `capacity`
    /// matches; a mismatch fails with [`PoolError::SizeMismatch`] because
    /// size can not be changed for active pools. A newly created pool (or an
    /// existing pool whose earlier configuration attempt failed) has
    /// `params` installed via [`Pool::set_config`] after the registry lock is
    /// released; on trial-connection failure the pool stays registered
    /// unconfigured and a later call with corrected parameters repairs it.
    pub async fn get_or_create(
        &self,
        name: &str,
        params: ConnectParams,
        capacity: usize,
        reset_on_release: bool,
    ) -> Result<Pool<F>, PoolError> {
        let pool = {
            let mut pools = self.pools.lock();
            match pools.entry(name.to_string()) {
                Entry::Occupied(occupied) => {
                    let existing = occupied.get();
                    if existing.capacity() != capacity {
                        return Err(PoolError::SizeMismatch {
                            pool: name.to_string(),
                            existing: existing.capacity(),
                            requested: capacity,
                        });
                    }
                    existing.clone()
                }
                Entry::Vacant(vacant) => {
                    let pool =
                        Pool::new(name, capacity, reset_on_release, Arc::clone(&self.factory))?;
                    tracing::info!(pool = %name, capacity, "pool registered");
                    vacant.insert(pool.clone());
                    pool
                }
            }
        };

        if !pool.is_configured() {
            pool.set_config(params).await?;
        }
        Ok(pool)
    }

    /// Check out a connection from the pool registered under `name`.
    ///
    /// Fails with an [`PoolError::Interface`] error when no such pool is
    /// registered; otherwise forwards to [`Pool::acquire`].
    pub async fn get_connection(&self, name: &str) -> Result<PooledConnection<F>, PoolError> {
        let pool = self
            .pool(name)
            .ok_or_else(|| PoolError::Interface(format!("pool {name:?} is not registered")))?;
        pool.acquire().await
    }

    /// Look up a registered pool by name.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<Pool<F>> {
        self.pools.lock().get(name).cloned()
    }

    /// Names of all registered pools, in no particular order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.pools.lock().keys().cloned().collect()
    }

    /// Number of registered pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    /// Whether the registry has no pools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }

    /// Tear down the registry: evict and disconnect every idle connection in
    /// every pool and deregister the pools. Returns the total evicted count.
    ///
    /// Connections currently checked out are untouched; their handles still
    /// return them to their (now deregistered) origin pools.
    pub async fn shutdown(&self) -> usize {
        let pools: Vec<Pool<F>> = {
            let mut map = self.pools.lock();
            map.drain().map(|(_, pool)| pool).collect()
        };

        let mut evicted = 0;
        for pool in pools {
            evicted += pool.remove_connections().await;
        }
        tracing::info!(evicted, "pool registry shut down");
        evicted
    }
}

impl<F: ConnectionFactory> fmt::Debug for PoolRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.names())
            .finish()
    }
}
