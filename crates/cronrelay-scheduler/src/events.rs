//! Scheduler event stream.
//!
//! Observers subscribe to a broadcast channel. Slow receivers lag and drop
//! events; senders never block.

use serde::Serialize;
use tokio::sync::broadcast;

use cronrelay_protocols::{ExecutionState, ExecutionType};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    BecameRunner {
        instance_id: String,
    },
    SchedulerStarted,
    SchedulerStopped,
    JobScheduled {
        job_id: String,
        kind: String,
    },
    ExecutionCreated {
        execution_id: String,
        job_id: String,
        execution_type: ExecutionType,
    },
    ExecutionTriggered {
        execution_id: String,
        job_id: String,
        runner: String,
        state: ExecutionState,
    },
    ExecutionRetrying {
        execution_id: String,
        job_id: String,
        retry_count: u32,
        reason: String,
    },
    ExecutionMarked {
        execution_id: String,
        job_id: String,
        state: ExecutionState,
    },
    MissedJobExecuted {
        job_id: String,
        missed_execution_id: String,
        execution_id: String,
    },
    HandlerInvoked {
        execution_id: String,
        job_id: String,
    },
}

/// Cloneable handle to the event channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: SchedulerEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_receivers() {
        let bus = EventBus::new();
        bus.emit(SchedulerEvent::SchedulerStarted);
    }

    #[tokio::test]
    async fn test_subscribe_receives() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(SchedulerEvent::JobScheduled {
            job_id: "JOB1".to_string(),
            kind: "cron".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SchedulerEvent::JobScheduled { job_id, .. } if job_id == "JOB1"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let value = serde_json::to_value(SchedulerEvent::ExecutionMarked {
            execution_id: "e1".to_string(),
            job_id: "JOB1".to_string(),
            state: ExecutionState::Failed,
        })
        .unwrap();
        assert_eq!(value["event"], "execution_marked");
        assert_eq!(value["state"], "FAILED");
    }
}
