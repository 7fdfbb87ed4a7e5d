//! Shared test doubles: an in-memory connection and factory with
//! observable lifecycle counters and injectable failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use client_pool::{ConnectParams, ConnectionFactory, ConnectionLifecycle, PoolError};

/// Per-connection counters, shared between the test and the connection so
/// they stay observable after the connection returns to a pool.
#[derive(Debug)]
pub struct ConnStats {
    pub id: u64,
    pub alive: AtomicBool,
    pub reconnects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub resets: AtomicUsize,
    pub fail_reconnect: AtomicBool,
    pub fail_reset: AtomicBool,
    pub applied: Mutex<Option<ConnectParams>>,
}

impl ConnStats {
    fn new(id: u64, params: &ConnectParams) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            fail_reconnect: AtomicBool::new(false),
            fail_reset: AtomicBool::new(false),
            applied: Mutex::new(Some(params.clone())),
        }
    }
}

#[derive(Debug)]
pub struct TestConnection {
    pub stats: Arc<ConnStats>,
}

#[async_trait]
impl ConnectionLifecycle for TestConnection {
    fn is_connected(&self) -> bool {
        self.stats.alive.load(Ordering::SeqCst)
    }

    fn apply_params(&mut self, params: &ConnectParams) -> Result<(), PoolError> {
        *self.stats.applied.lock() = Some(params.clone());
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), PoolError> {
        if self.stats.fail_reconnect.load(Ordering::SeqCst) {
            return Err(PoolError::Interface("reconnect refused".to_string()));
        }
        self.stats.alive.store(true, Ordering::SeqCst);
        self.stats.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PoolError> {
        self.stats.alive.store(false, Ordering::SeqCst);
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset_session(&mut self) -> Result<(), PoolError> {
        if self.stats.fail_reset.load(Ordering::SeqCst) {
            return Err(PoolError::Interface("reset refused".to_string()));
        }
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn server_version(&mut self) -> Result<String, PoolError> {
        Ok(format!("test-server-{}", self.stats.id))
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    next_id: AtomicU64,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
    created: Mutex<Vec<Arc<ConnStats>>>,
}

/// Clonable factory; clones share counters and created-connection stats.
#[derive(Debug, Clone, Default)]
pub struct TestFactory {
    state: Arc<FactoryState>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful connects, trial connections included.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Stats handles for every connection ever created, in creation order.
    pub fn created(&self) -> Vec<Arc<ConnStats>> {
        self.state.created.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for TestFactory {
    type Connection = TestConnection;

    async fn connect(&self, params: &ConnectParams) -> Result<TestConnection, PoolError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(PoolError::Interface("connect refused".to_string()));
        }
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stats = Arc::new(ConnStats::new(id, params));
        self.state.created.lock().push(Arc::clone(&stats));
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(TestConnection { stats })
    }
}

pub fn test_params() -> ConnectParams {
    ConnectParams::new()
        .set("host", "localhost")
        .set("model", "ranker-v1")
}
