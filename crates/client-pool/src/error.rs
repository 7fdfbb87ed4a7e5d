//! Pool error types.

use thiserror::Error;

/// Errors produced by pools, the pool registry, and connection collaborators.
///
/// Every variant except [`PoolError::Validation`] represents an expected,
/// recoverable condition callers can branch on. No error path leaks a
/// connection: a connection that fails repair during checkout is pushed back
/// onto its pool's idle queue before the error is surfaced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Illegal pool name or capacity at construction. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A pool operation requires a configuration but none has been set.
    #[error("pool {pool:?} has no configuration; call set_config first")]
    NoConfig {
        /// Name of the unconfigured pool.
        pool: String,
    },

    /// The idle queue has no free slot for another connection.
    #[error("idle queue for pool {pool:?} is full (capacity {capacity})")]
    QueueFull {
        /// Name of the pool.
        pool: String,
        /// Configured capacity of the pool.
        capacity: usize,
    },

    /// No idle connection is available right now. Checkout never waits.
    #[error("pool {pool:?} is exhausted; no idle connection available")]
    Exhausted {
        /// Name of the pool.
        pool: String,
    },

    /// Size can not be changed for active pools.
    #[error(
        "size can not be changed for active pool {pool:?}: \
         registered capacity {existing}, requested {requested}"
    )]
    SizeMismatch {
        /// Name of the already-registered pool.
        pool: String,
        /// Capacity the pool was registered with.
        existing: usize,
        /// Capacity requested by the conflicting call.
        requested: usize,
    },

    /// A candidate configuration was rejected by its trial connection.
    /// The pool keeps its previous configuration and version.
    #[error("configuration rejected for pool {pool:?}")]
    InvalidConfig {
        /// Name of the pool.
        pool: String,
        /// The underlying connection failure.
        #[source]
        source: Box<PoolError>,
    },

    /// Pooled connections may not be reconfigured individually; all
    /// configuration changes go through [`Pool::set_config`](crate::Pool::set_config).
    #[error("pooled connections can not be reconfigured individually; use Pool::set_config")]
    ConfigThroughPoolOnly,

    /// Failure to obtain a working connection (connect or reconnect failed).
    #[error("interface error: {0}")]
    Interface(String),

    /// Collaborator-reported misuse. Propagated unchanged.
    #[error("programming error: {0}")]
    Programming(String),

    /// The connection refused an unsupported operation. Propagated unchanged.
    #[error("not supported: {0}")]
    NotSupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_message() {
        let err = PoolError::SizeMismatch {
            pool: "inference".to_string(),
            existing: 5,
            requested: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains("size can not be changed for active pool"));
        assert!(msg.contains('5'));
        assert!(msg.contains('6'));
    }

    #[test]
    fn test_invalid_config_carries_source() {
        let err = PoolError::InvalidConfig {
            pool: "inference".to_string(),
            source: Box::new(PoolError::Interface("refused".to_string())),
        };
        let source = std::error::Error::source(&err);
        assert!(source.is_some_and(|s| s.to_string().contains("refused")));
    }

    #[test]
    fn test_exhausted_message_names_pool() {
        let err = PoolError::Exhausted {
            pool: "search".to_string(),
        };
        assert!(err.to_string().contains("\"search\""));
    }
}
