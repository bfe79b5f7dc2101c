//! Bookkeeping of the triggers armed in the current leadership epoch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::triggers::TriggerSource;

struct ArmedTrigger {
    source: Arc<dyn TriggerSource>,
    cancel: CancellationToken,
}

/// Job id to armed trigger. At most one trigger per job.
#[derive(Default)]
pub struct ArmedTriggers {
    triggers: DashMap<String, ArmedTrigger>,
}

impl ArmedTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trigger for `job_id`. Returns `false` if one is already armed.
    pub fn insert(
        &self,
        job_id: &str,
        source: Arc<dyn TriggerSource>,
        cancel: CancellationToken,
    ) -> bool {
        match self.triggers.entry(job_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(ArmedTrigger { source, cancel });
                true
            }
        }
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.triggers.contains_key(job_id)
    }

    /// Cancel and forget the trigger of `job_id`.
    pub fn disarm(&self, job_id: &str) -> bool {
        match self.triggers.remove(job_id) {
            Some((_, armed)) => {
                armed.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and forget every trigger.
    pub fn clear(&self) {
        for entry in self.triggers.iter() {
            entry.value().cancel.cancel();
        }
        self.triggers.clear();
    }

    /// Predicted next fire of a job, for triggers that track missed fires.
    pub fn next_tracked_fire(&self, job_id: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let entry = self.triggers.get(job_id)?;
        let source = &entry.value().source;
        if source.tracks_missed_fires() {
            source.next_fire_after(after)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
