//! Single-process leader gate.
//!
//! Holds leadership of one named lock for this process. Administrative
//! enable/disable stands in for lock acquisition and loss, and drives the
//! registered [`LeadershipListener`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::info;

use cronrelay_protocols::{LeaderGate, LeadershipListener};

pub struct LocalLeaderGate {
    lock_name: String,
    leader: AtomicBool,
    reason: RwLock<Option<String>>,
    listeners: RwLock<Vec<Arc<dyn LeadershipListener>>>,
    /// Serializes transitions so listeners observe them in order.
    transition: Mutex<()>,
}

impl LocalLeaderGate {
    /// Create a gate for `lock_name`, initially not leading.
    pub fn new(lock_name: impl Into<String>) -> Self {
        Self {
            lock_name: lock_name.into(),
            leader: AtomicBool::new(false),
            reason: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            transition: Mutex::new(()),
        }
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    pub fn add_listener(&self, listener: Arc<dyn LeadershipListener>) {
        self.listeners.write().push(listener);
    }

    /// Reason given for the last transition.
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    /// Acquire leadership. Returns `false` if already leading.
    pub async fn enable(&self, reason: &str) -> bool {
        let _guard = self.transition.lock().await;
        if self.leader.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.reason.write() = Some(reason.to_string());
        info!("Leadership of {} acquired: {}", self.lock_name, reason);

        for listener in self.snapshot_listeners() {
            listener.on_acquired().await;
        }
        true
    }

    /// Give up leadership. Returns `false` if not leading.
    pub async fn disable(&self, reason: &str) -> bool {
        let _guard = self.transition.lock().await;
        if !self.leader.swap(false, Ordering::SeqCst) {
            return false;
        }
        *self.reason.write() = Some(reason.to_string());
        info!("Leadership of {} released: {}", self.lock_name, reason);

        for listener in self.snapshot_listeners() {
            listener.on_lost().await;
        }
        true
    }

    fn snapshot_listeners(&self) -> Vec<Arc<dyn LeadershipListener>> {
        self.listeners.read().clone()
    }
}

impl LeaderGate for LocalLeaderGate {
    fn is_leader(&self, lock_name: &str) -> bool {
        lock_name == self.lock_name && self.leader.load(Ordering::SeqCst)
    }
}
