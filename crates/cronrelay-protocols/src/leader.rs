//! Leader election collaborator.

use async_trait::async_trait;

/// Read-only view of the distributed lock gating the scheduler.
pub trait LeaderGate: Send + Sync {
    /// `true` if this instance currently holds `lock_name`.
    fn is_leader(&self, lock_name: &str) -> bool;
}

/// Callbacks invoked by a gate implementation on leadership transitions.
#[async_trait]
pub trait LeadershipListener: Send + Sync {
    async fn on_acquired(&self);

    async fn on_lost(&self);
}
