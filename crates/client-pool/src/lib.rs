//! # client-pool
//!
//! Bounded, named, thread-safe pool for reusable, expensive-to-create
//! connection objects (API clients, model handles) shared across concurrent
//! callers.
//!
//! ## Features
//!
//! - Process-wide [`PoolRegistry`]: at most one pool per name, with capacity
//!   pinned at registration
//! - Bounded FIFO idle queue per pool (capacity 1..=32), served
//!   oldest-idle-first
//! - Config-versioned invalidation: `set_config` bumps an opaque
//!   [`ConfigVersion`] and stale connections are reconfigured and
//!   reconnected at their next checkout
//! - RAII checkout guard: a [`PooledConnection`] returns its connection to
//!   the origin pool on drop, so no documented error path leaks a connection
//! - Fail-fast checkout: an empty pool is an immediate
//!   [`PoolError::Exhausted`], never a wait
//!
//! ## Example
//!
//! ```rust,ignore
//! use client_pool::{ConnectParams, PoolRegistry};
//!
//! let registry = PoolRegistry::new(HttpClientFactory::default());
//!
//! let pool = registry
//!     .get_or_create(
//!         "inference",
//!         ConnectParams::new().set("host", "inference.internal"),
//!         8,
//!         true,
//!     )
//!     .await?;
//! pool.add_connection(None).await?;
//!
//! let mut conn = registry.get_connection("inference").await?;
//! // use `conn` as the underlying client...
//! conn.close().await?; // or just drop it
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod registry;

// Configuration
pub use config::{ConfigVersion, ConnectParams, PoolConfig};

// Error types
pub use error::PoolError;

// Lifecycle traits
pub use lifecycle::{ConnectionFactory, ConnectionLifecycle};

// Pool types
pub use pool::{MAX_CAPACITY, MAX_NAME_LEN, MIN_CAPACITY, Pool, PoolStatus, PooledConnection};

// Registry
pub use registry::PoolRegistry;
