//! Validated job administration.

use std::sync::Arc;

use tracing::{info, warn};

use cronrelay_protocols::fields::job as jf;
use cronrelay_protocols::{
    Filter, Job, Patch, RecordStore, ScheduleKind, StoreError, ValidationError,
};

use crate::cron_expr::parse_cron;
use crate::error::CatalogError;
use crate::registry::HandlerRegistry;

/// Creates, lists and toggles jobs, rejecting definitions that could never run.
pub struct JobCatalog {
    jobs: Arc<dyn RecordStore<Job>>,
    handlers: Arc<HandlerRegistry>,
}

impl JobCatalog {
    pub fn new(jobs: Arc<dyn RecordStore<Job>>, handlers: Arc<HandlerRegistry>) -> Self {
        Self { jobs, handlers }
    }

    /// Full validation: structure, cron syntax and handler resolution.
    pub fn validate(&self, job: &Job) -> Result<ScheduleKind, ValidationError> {
        let kind = job.validate()?;

        if let ScheduleKind::Cron(expr) = &kind {
            parse_cron(expr).map_err(|e| ValidationError::InvalidCron {
                job_id: job.job_id.clone(),
                expression: expr.clone(),
                reason: e.to_string(),
            })?;
        }

        if !self.handlers.contains(&job.mdl, &job.function) {
            return Err(ValidationError::HandlerNotFound {
                job_id: job.job_id.clone(),
                mdl: job.mdl.clone(),
                function: job.function.clone(),
            });
        }

        Ok(kind)
    }

    /// Validate and store a new job. The stored job starts unscheduled.
    pub async fn create(&self, mut job: Job) -> Result<Job, CatalogError> {
        self.validate(&job)?;
        job.scheduled = false;

        match self.jobs.create(job).await {
            Ok(created) => {
                info!("Created job {}", created.job_id);
                Ok(created)
            }
            Err(StoreError::Duplicate { id, .. }) => {
                Err(ValidationError::DuplicateJob(id).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create every job, stopping at the first failure.
    pub async fn create_many(&self, jobs: Vec<Job>) -> Result<Vec<Job>, CatalogError> {
        for job in &jobs {
            self.validate(job)?;
        }
        let mut created = Vec::with_capacity(jobs.len());
        for job in jobs {
            created.push(self.create(job).await?);
        }
        Ok(created)
    }

    /// Create seed jobs, skipping ones that already exist.
    pub async fn seed(&self, jobs: Vec<Job>) -> Result<usize, CatalogError> {
        let mut count = 0;
        for job in jobs {
            match self.create(job).await {
                Ok(_) => count += 1,
                Err(CatalogError::Validation(ValidationError::DuplicateJob(id))) => {
                    warn!("Seed job {} already exists, leaving it unchanged", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    pub async fn list(&self) -> Result<Vec<Job>, CatalogError> {
        Ok(self.jobs.find(&Filter::new()).await?)
    }

    pub async fn get(&self, job_id: &str) -> Result<Job, CatalogError> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(job_id.to_string()))
    }

    /// Flip a job's `enabled` flag.
    ///
    /// Re-enabling clears `scheduled` so the next activation pass re-arms it.
    pub async fn set_enabled(&self, job_id: &str, enabled: bool) -> Result<Job, CatalogError> {
        let mut patch = Patch::new().set(jf::ENABLED, enabled);
        if enabled {
            patch = patch.set(jf::SCHEDULED, false);
        }

        let job = self
            .jobs
            .update_by_id(job_id, patch)
            .await?
            .ok_or_else(|| CatalogError::NotFound(job_id.to_string()))?;
        info!("Job {} {}", job_id, if enabled { "enabled" } else { "disabled" });
        Ok(job)
    }

    pub async fn delete(&self, job_id: &str) -> Result<(), CatalogError> {
        if !self.jobs.delete_by_id(job_id).await? {
            return Err(CatalogError::NotFound(job_id.to_string()));
        }
        info!("Deleted job {}", job_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
