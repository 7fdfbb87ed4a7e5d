//! Connection configuration snapshots and version tokens.

use std::collections::BTreeMap;
use std::fmt;

/// Opaque key/value connection-construction parameters.
///
/// The pool never interprets these; they are passed verbatim to the
/// [`ConnectionFactory`](crate::ConnectionFactory) and to
/// [`ConnectionLifecycle::apply_params`](crate::ConnectionLifecycle::apply_params)
/// during stale-connection repair.
///
/// # Example
///
/// ```rust
/// use client_pool::ConnectParams;
///
/// let params = ConnectParams::new()
///     .set("host", "inference.internal")
///     .set("model", "ranker-v3");
///
/// assert_eq!(params.get("model"), Some("ranker-v3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    params: BTreeMap<String, String>,
}

impl ConnectParams {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for the key.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the parameter set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Opaque configuration version token.
///
/// Generated by the pool as a per-pool monotonic counter; one new token per
/// successful `set_config`. Callers treat it as comparable-for-equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigVersion(u64);

impl ConfigVersion {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Immutable snapshot of a pool's active connection configuration.
///
/// Replaced wholesale by `set_config`, never mutated in place, so concurrent
/// readers can never observe a torn write.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    params: ConnectParams,
    version: ConfigVersion,
}

impl PoolConfig {
    pub(crate) fn new(params: ConnectParams, version: ConfigVersion) -> Self {
        Self { params, version }
    }

    /// The connection-construction parameters.
    #[must_use]
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// The version token stamped on connections built from this snapshot.
    #[must_use]
    pub fn version(&self) -> ConfigVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_set_and_get() {
        let params = ConnectParams::new()
            .set("host", "localhost")
            .set("port", "8080");

        assert_eq!(params.get("host"), Some("localhost"));
        assert_eq!(params.get("port"), Some("8080"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_set_replaces() {
        let params = ConnectParams::new()
            .set("host", "old")
            .set("host", "new");

        assert_eq!(params.get("host"), Some("new"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_params_iterate_in_key_order() {
        let params = ConnectParams::new()
            .set("b", "2")
            .set("a", "1");

        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_version_equality_and_display() {
        let v1 = ConfigVersion::new(1);
        let v2 = ConfigVersion::new(2);

        assert_eq!(v1, ConfigVersion::new(1));
        assert_ne!(v1, v2);
        assert_eq!(v2.to_string(), "v2");
    }
}
