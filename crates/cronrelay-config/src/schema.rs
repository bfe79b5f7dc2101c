//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use cronrelay_protocols::Job;
use serde::{Deserialize, Serialize};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Job definitions created at boot if absent.
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Config {
    /// Port the runner advertises, defaulting to the server port.
    pub fn runner_port(&self) -> u16 {
        self.runner.advertise_port.unwrap_or(self.server.port)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Master-side scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name of the leader lock gating the scheduler.
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Whether this instance competes for scheduling at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_runner_update_interval")]
    pub runner_update_interval_ms: u64,

    #[serde(default = "default_schedule_new_jobs_interval")]
    pub schedule_new_jobs_interval_ms: u64,

    #[serde(default = "default_defunct_retry_interval")]
    pub defunct_retry_interval_ms: u64,

    /// Multiple of the defunct interval after which an execution is stalled.
    #[serde(default = "default_tolerance_factor")]
    pub defunct_tolerance_factor: u32,

    #[serde(default = "default_trigger_fail_retry_delay")]
    pub trigger_fail_retry_delay_ms: u64,

    #[serde(default = "default_missed_trigger_grace")]
    pub missed_trigger_grace_ms: u64,

    #[serde(default = "default_trigger_timeout")]
    pub trigger_timeout_ms: u64,

    #[serde(default = "default_max_retry_count")]
    pub default_max_retry_count: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_name: default_lock_name(),
            enabled: true,
            runner_update_interval_ms: default_runner_update_interval(),
            schedule_new_jobs_interval_ms: default_schedule_new_jobs_interval(),
            defunct_retry_interval_ms: default_defunct_retry_interval(),
            defunct_tolerance_factor: default_tolerance_factor(),
            trigger_fail_retry_delay_ms: default_trigger_fail_retry_delay(),
            missed_trigger_grace_ms: default_missed_trigger_grace(),
            trigger_timeout_ms: default_trigger_timeout(),
            default_max_retry_count: default_max_retry_count(),
        }
    }
}

impl SchedulerConfig {
    pub fn runner_update_interval(&self) -> Duration {
        Duration::from_millis(self.runner_update_interval_ms)
    }

    pub fn schedule_new_jobs_interval(&self) -> Duration {
        Duration::from_millis(self.schedule_new_jobs_interval_ms)
    }

    pub fn defunct_retry_interval(&self) -> Duration {
        Duration::from_millis(self.defunct_retry_interval_ms)
    }

    /// Age of `lastUpdateTime` beyond which an execution is considered stalled.
    pub fn defunct_tolerance(&self) -> Duration {
        self.defunct_retry_interval() * self.defunct_tolerance_factor
    }

    pub fn trigger_fail_retry_delay(&self) -> Duration {
        Duration::from_millis(self.trigger_fail_retry_delay_ms)
    }

    pub fn missed_trigger_grace(&self) -> Duration {
        Duration::from_millis(self.missed_trigger_grace_ms)
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_timeout_ms)
    }
}

fn default_lock_name() -> String {
    "JOB-SCHEDULER".to_string()
}

fn default_true() -> bool {
    true
}

fn default_runner_update_interval() -> u64 {
    15_000
}

fn default_schedule_new_jobs_interval() -> u64 {
    30_000
}

fn default_defunct_retry_interval() -> u64 {
    30_000
}

fn default_tolerance_factor() -> u32 {
    3
}

fn default_trigger_fail_retry_delay() -> u64 {
    5_000
}

fn default_missed_trigger_grace() -> u64 {
    30_000
}

fn default_trigger_timeout() -> u64 {
    10_000
}

fn default_max_retry_count() -> u32 {
    cronrelay_protocols::DEFAULT_MAX_RETRY_COUNT
}

/// Runner-side registration and heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host the master uses to reach this runner.
    #[serde(default = "default_host")]
    pub advertise_host: String,

    /// Port the master uses to reach this runner. Defaults to `server.port`.
    #[serde(default)]
    pub advertise_port: Option<u16>,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_tolerance_factor")]
    pub heartbeat_tolerance_factor: u32,

    #[serde(default = "default_max_heartbeat_retry_count")]
    pub max_heartbeat_retry_count: u32,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_ms: u64,

    #[serde(default = "default_register_retry_delay")]
    pub register_retry_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            advertise_host: default_host(),
            advertise_port: None,
            heartbeat_interval_ms: default_heartbeat_interval(),
            heartbeat_tolerance_factor: default_tolerance_factor(),
            max_heartbeat_retry_count: default_max_heartbeat_retry_count(),
            cleanup_interval_ms: default_cleanup_interval(),
            register_retry_delay_ms: default_register_retry_delay(),
        }
    }
}

impl RunnerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Heartbeat age beyond which a runner is stale.
    pub fn heartbeat_tolerance(&self) -> Duration {
        self.heartbeat_interval() * self.heartbeat_tolerance_factor
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn register_retry_delay(&self) -> Duration {
        Duration::from_millis(self.register_retry_delay_ms)
    }
}

fn default_heartbeat_interval() -> u64 {
    20_000
}

fn default_max_heartbeat_retry_count() -> u32 {
    3
}

fn default_cleanup_interval() -> u64 {
    15_000
}

fn default_register_retry_delay() -> u64 {
    5_000
}

/// Log file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    /// Log directory with `~` expanded.
    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.directory))
    }
}

fn default_log_directory() -> String {
    "~/.cronrelay/logs".to_string()
}

fn default_file_prefix() -> String {
    "cronrelay".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.runner_update_interval(), Duration::from_secs(15));
        assert_eq!(config.schedule_new_jobs_interval(), Duration::from_secs(30));
        assert_eq!(config.defunct_retry_interval(), Duration::from_secs(30));
        assert_eq!(config.defunct_tolerance(), Duration::from_secs(90));
        assert_eq!(config.trigger_fail_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.missed_trigger_grace(), Duration::from_secs(30));
        assert_eq!(config.default_max_retry_count, 3);
    }

    #[test]
    fn test_runner_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(20));
        assert_eq!(config.heartbeat_tolerance(), Duration::from_secs(60));
        assert_eq!(config.max_heartbeat_retry_count, 3);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(15));
        assert!(config.advertise_port.is_none());
    }

    #[test]
    fn test_runner_port_falls_back_to_server() {
        let mut config = Config::default();
        config.server.port = 9100;
        assert_eq!(config.runner_port(), 9100);
        config.runner.advertise_port = Some(9200);
        assert_eq!(config.runner_port(), 9200);
    }

    #[test]
    fn test_logging_directory_expanded() {
        let config = LoggingConfig::default();
        assert!(!config.directory_path().to_string_lossy().starts_with('~'));
    }
}
