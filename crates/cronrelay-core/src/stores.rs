use std::sync::Arc;

use cronrelay_protocols::{Job, JobExecution, JobRunner, RecordStore};

use crate::MemoryStore;

/// The three record collections the scheduler works against.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn RecordStore<Job>>,
    pub executions: Arc<dyn RecordStore<JobExecution>>,
    pub runners: Arc<dyn RecordStore<JobRunner>>,
}

impl Stores {
    pub fn new(
        jobs: Arc<dyn RecordStore<Job>>,
        executions: Arc<dyn RecordStore<JobExecution>>,
        runners: Arc<dyn RecordStore<JobRunner>>,
    ) -> Self {
        Self {
            jobs,
            executions,
            runners,
        }
    }

    /// Fresh in-process stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::<Job>::new()),
            Arc::new(MemoryStore::<JobExecution>::new()),
            Arc::new(MemoryStore::<JobRunner>::new()),
        )
    }
}
