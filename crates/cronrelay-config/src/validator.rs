//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationIssue) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into a single error if any errors were found.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.first() {
            None => Ok(self.warnings),
            Some(first) => Err(ConfigError::InvalidValue {
                field: first.path.clone(),
                message: first.message.clone(),
            }),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_runner(config, &mut result);
        Self::validate_jobs(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationIssue::new("server.port", "Port cannot be 0"));
        }
        if config.server.host.is_empty() {
            result.add_error(ValidationIssue::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;

        if scheduler.lock_name.trim().is_empty() {
            result.add_error(ValidationIssue::new(
                "scheduler.lock_name",
                "lock_name cannot be empty",
            ));
        }

        let intervals = [
            ("scheduler.runner_update_interval_ms", scheduler.runner_update_interval_ms),
            ("scheduler.schedule_new_jobs_interval_ms", scheduler.schedule_new_jobs_interval_ms),
            ("scheduler.defunct_retry_interval_ms", scheduler.defunct_retry_interval_ms),
            ("scheduler.trigger_timeout_ms", scheduler.trigger_timeout_ms),
        ];
        for (path, value) in intervals {
            if value == 0 {
                result.add_error(ValidationIssue::new(path, "interval must be greater than 0"));
            }
        }

        if scheduler.defunct_tolerance_factor < 1 {
            result.add_error(ValidationIssue::new(
                "scheduler.defunct_tolerance_factor",
                "tolerance factor must be at least 1",
            ));
        }

        if scheduler.trigger_fail_retry_delay_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "scheduler.trigger_fail_retry_delay_ms",
                "retries will fire back to back with no delay",
            ));
        }
    }

    fn validate_runner(config: &Config, result: &mut ValidationResult) {
        let runner = &config.runner;

        if runner.heartbeat_interval_ms == 0 {
            result.add_error(ValidationIssue::new(
                "runner.heartbeat_interval_ms",
                "interval must be greater than 0",
            ));
        }
        if runner.cleanup_interval_ms == 0 {
            result.add_error(ValidationIssue::new(
                "runner.cleanup_interval_ms",
                "interval must be greater than 0",
            ));
        }
        if runner.heartbeat_tolerance_factor < 1 {
            result.add_error(ValidationIssue::new(
                "runner.heartbeat_tolerance_factor",
                "tolerance factor must be at least 1",
            ));
        } else if runner.heartbeat_interval() >= runner.heartbeat_tolerance()
            && runner.heartbeat_interval_ms > 0
        {
            result.add_error(ValidationIssue::new(
                "runner.heartbeat_tolerance_factor",
                "heartbeat interval must be strictly below its tolerance window",
            ));
        }

        if runner.enabled && runner.advertise_host.trim().is_empty() {
            result.add_error(ValidationIssue::new(
                "runner.advertise_host",
                "advertise_host cannot be empty when the runner is enabled",
            ));
        }
    }

    fn validate_jobs(config: &Config, result: &mut ValidationResult) {
        let mut seen = std::collections::HashSet::new();
        for (idx, job) in config.jobs.iter().enumerate() {
            let path = format!("jobs[{}]", idx);
            if let Err(e) = job.validate() {
                result.add_error(ValidationIssue::new(path.clone(), e.to_string()));
            }
            if !seen.insert(job.job_id.as_str()) {
                result.add_error(ValidationIssue::new(
                    path,
                    format!("duplicate jobID '{}'", job.job_id),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
