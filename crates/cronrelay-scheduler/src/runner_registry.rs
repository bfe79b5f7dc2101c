//! Master-side view of live runners.
//!
//! Holds a cached snapshot of non-stale runners and a round-robin cursor.
//! The snapshot may briefly lag the store; selection favours availability
//! over perfect balance.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use cronrelay_protocols::fields::runner as rf;
use cronrelay_protocols::{Filter, JobRunner, RecordStore, StoreError};

struct Snapshot {
    runners: Vec<JobRunner>,
    refreshed_at: Option<Instant>,
}

pub struct RunnerRegistry {
    store: Arc<dyn RecordStore<JobRunner>>,
    /// Heartbeat age beyond which a runner is stale.
    tolerance: Duration,
    /// Snapshot age beyond which `select` refreshes on demand.
    max_age: Duration,
    snapshot: RwLock<Snapshot>,
    cursor: AtomicUsize,
}

impl RunnerRegistry {
    pub fn new(store: Arc<dyn RecordStore<JobRunner>>, tolerance: Duration, max_age: Duration) -> Self {
        Self {
            store,
            tolerance,
            max_age,
            snapshot: RwLock::new(Snapshot {
                runners: Vec::new(),
                refreshed_at: None,
            }),
            cursor: AtomicUsize::new(0),
        }
    }

    fn stale_cutoff(&self) -> chrono::DateTime<Utc> {
        let tolerance = chrono::Duration::from_std(self.tolerance).unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_sub_signed(tolerance)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
    }

    /// Reload the snapshot with every non-stale runner.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let cutoff = self.stale_cutoff();
        let runners: Vec<JobRunner> = self
            .store
            .find(&Filter::new())
            .await?
            .into_iter()
            .filter(|r| r.heartbeat_time >= cutoff)
            .collect();

        let count = runners.len();
        let mut snapshot = self.snapshot.write();
        snapshot.runners = runners;
        snapshot.refreshed_at = Some(Instant::now());
        debug!("Runner snapshot refreshed: {} live runner(s)", count);
        Ok(count)
    }

    fn needs_refresh(&self) -> bool {
        let snapshot = self.snapshot.read();
        snapshot.runners.is_empty()
            || snapshot
                .refreshed_at
                .is_none_or(|at| at.elapsed() >= self.max_age)
    }

    /// Next runner in round-robin order, or `None` if no runner is live.
    pub async fn select(&self) -> Result<Option<JobRunner>, StoreError> {
        if self.needs_refresh() {
            self.refresh().await?;
        }

        let snapshot = self.snapshot.read();
        if snapshot.runners.is_empty() {
            return Ok(None);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % snapshot.runners.len();
        Ok(Some(snapshot.runners[idx].clone()))
    }

    /// Delete runner rows whose heartbeat exceeded tolerance.
    pub async fn cleanup_stale(&self) -> Result<usize, StoreError> {
        let stale = self
            .store
            .find(&Filter::new().lt_time(rf::HEARTBEAT_TIME, self.stale_cutoff()))
            .await?;

        let mut removed = 0;
        for runner in stale {
            if self.store.delete_by_id(&runner.instance_id).await? {
                info!(
                    "Removed stale runner {} ({}:{})",
                    runner.instance_id, runner.hostname, runner.port
                );
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Current snapshot.
    pub fn runners(&self) -> Vec<JobRunner> {
        self.snapshot.read().runners.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().runners.is_empty()
    }

    /// Drop the snapshot and rewind the cursor.
    pub fn reset(&self) {
        let mut snapshot = self.snapshot.write();
        snapshot.runners.clear();
        snapshot.refreshed_at = None;
        self.cursor.store(0, Ordering::Relaxed);
    }

    /// Periodically refresh the snapshot until cancelled.
    pub async fn run_refresh_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        error!("Runner snapshot refresh failed: {}", e);
                    }
                }
            }
        }
    }

    /// Periodically delete stale runner rows until cancelled.
    pub async fn run_cleanup_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.cleanup_stale().await {
                        error!("Stale runner cleanup failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_registry_tests.rs"]
mod tests;
