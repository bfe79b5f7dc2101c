//! Runner-side registration and heartbeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cronrelay_config::RunnerConfig;
use cronrelay_protocols::fields::runner as rf;
use cronrelay_protocols::{JobRunner, Patch, RecordStore, StoreError};

use crate::events::{EventBus, SchedulerEvent};

/// Keeps this process registered as a runner.
pub struct RunnerAgent {
    store: Arc<dyn RecordStore<JobRunner>>,
    instance_id: String,
    hostname: String,
    port: u16,
    config: RunnerConfig,
    events: EventBus,
    consecutive_failures: AtomicU32,
}

impl RunnerAgent {
    pub fn new(
        store: Arc<dyn RecordStore<JobRunner>>,
        hostname: impl Into<String>,
        port: u16,
        config: RunnerConfig,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            instance_id: Uuid::new_v4().to_string(),
            hostname: hostname.into(),
            port,
            config,
            events,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Unique for the lifetime of this process.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Replace any previous record of this instance with a fresh one.
    async fn register_once(&self) -> Result<JobRunner, StoreError> {
        self.store.delete_by_id(&self.instance_id).await?;
        self.store
            .create(JobRunner::new(&self.instance_id, &self.hostname, self.port))
            .await
    }

    /// Register, retrying after `register_retry_delay` until it succeeds.
    ///
    /// Returns `false` if cancelled first.
    pub async fn become_runner(&self, cancel: &CancellationToken) -> bool {
        loop {
            match self.register_once().await {
                Ok(runner) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    info!(
                        "Registered as job runner {} at {}",
                        runner.instance_id,
                        runner.base_url()
                    );
                    self.events.emit(SchedulerEvent::BecameRunner {
                        instance_id: runner.instance_id,
                    });
                    return true;
                }
                Err(e) => {
                    error!(
                        "Runner registration failed, retrying in {:?}: {}",
                        self.config.register_retry_delay(),
                        e
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.register_retry_delay()) => {}
            }
        }
    }

    /// One heartbeat tick.
    ///
    /// A missing own record counts as a failure; after more than
    /// `max_heartbeat_retry_count` consecutive failures the record is dropped
    /// and the agent registers again.
    pub async fn heartbeat(&self, cancel: &CancellationToken) {
        let patch = Patch::new().set_time(rf::HEARTBEAT_TIME, Utc::now());
        let failure = match self.store.update_by_id(&self.instance_id, patch).await {
            Ok(Some(_)) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                debug!("Runner {} heartbeat sent", self.instance_id);
                return;
            }
            Ok(None) => "runner record missing".to_string(),
            Err(e) => e.to_string(),
        };

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > self.config.max_heartbeat_retry_count {
            warn!(
                "Runner {} heartbeat failed {} times ({}), re-registering",
                self.instance_id, failures, failure
            );
            if let Err(e) = self.store.delete_by_id(&self.instance_id).await {
                debug!("Could not delete own runner record: {}", e);
            }
            self.become_runner(cancel).await;
        } else {
            warn!(
                "Runner {} heartbeat failed ({}/{}): {}",
                self.instance_id, failures, self.config.max_heartbeat_retry_count, failure
            );
        }
    }

    /// Register, then heartbeat every `heartbeat_interval` until cancelled.
    /// The own record is removed on the way out.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.become_runner(&cancel).await {
            return;
        }

        let mut ticker = tokio::time::interval(self.config.heartbeat_interval());
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.heartbeat(&cancel).await,
            }
        }

        match self.store.delete_by_id(&self.instance_id).await {
            Ok(_) => info!("Runner {} deregistered", self.instance_id),
            Err(e) => warn!("Runner {} deregistration failed: {}", self.instance_id, e),
        }
    }
}

#[cfg(test)]
#[path = "runner_agent_tests.rs"]
mod tests;
