//! Worker tuning configuration, read from the environment.

use std::time::Duration;

use figment::{Figment, providers::Env};
use serde::Deserialize;

/// Effective worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often the loop wakes up to claim jobs.
    pub job_poll_interval: Duration,

    /// How often due schedules are scanned (and orphaned claims swept).
    pub schedule_check_interval: Duration,

    /// How often stale anchors are scanned.
    pub stale_check_interval: Duration,

    /// Maximum number of jobs claimed per poll tick.
    pub job_batch_size: usize,

    /// Age after which a processing claim is considered orphaned.
    pub job_orphan_timeout: Duration,
}

impl WorkerConfig {
    /// Reads the configuration from the environment.
    ///
    /// Recognized variables (all optional, values in seconds unless noted):
    /// `JOB_POLL_INTERVAL` (30), `SCHEDULE_CHECK_INTERVAL` (900),
    /// `STALE_CHECK_INTERVAL` (3600), `JOB_BATCH_SIZE` (count, 5),
    /// `JOB_ORPHAN_TIMEOUT` (600).
    pub fn from_env() -> Result<Self, figment::Error> {
        let raw: RawConfig = Figment::new().merge(Env::raw()).extract()?;
        Ok(raw.into())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    job_poll_interval: u64,
    schedule_check_interval: u64,
    stale_check_interval: u64,
    job_batch_size: usize,
    job_orphan_timeout: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            job_poll_interval: 30,
            schedule_check_interval: 900,
            stale_check_interval: 3600,
            job_batch_size: 5,
            job_orphan_timeout: 600,
        }
    }
}

impl From<RawConfig> for WorkerConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            job_poll_interval: Duration::from_secs(raw.job_poll_interval),
            schedule_check_interval: Duration::from_secs(raw.schedule_check_interval),
            stale_check_interval: Duration::from_secs(raw.stale_check_interval),
            job_batch_size: raw.job_batch_size,
            job_orphan_timeout: Duration::from_secs(raw.job_orphan_timeout),
        }
    }
}

/// Snapshot of the effective configuration for status reporting, with
/// durations flattened back to seconds.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfigSnapshot {
    pub job_poll_interval: u64,
    pub schedule_check_interval: u64,
    pub stale_check_interval: u64,
    pub job_batch_size: usize,
    pub job_orphan_timeout: u64,
}

impl From<&WorkerConfig> for ConfigSnapshot {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            job_poll_interval: config.job_poll_interval.as_secs(),
            schedule_check_interval: config.schedule_check_interval.as_secs(),
            stale_check_interval: config.stale_check_interval.as_secs(),
            job_batch_size: config.job_batch_size,
            job_orphan_timeout: config.job_orphan_timeout.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.job_poll_interval, Duration::from_secs(30));
        assert_eq!(config.schedule_check_interval, Duration::from_secs(900));
        assert_eq!(config.stale_check_interval, Duration::from_secs(3600));
        assert_eq!(config.job_batch_size, 5);
        assert_eq!(config.job_orphan_timeout, Duration::from_secs(600));
    }

    #[test]
    fn environment_overrides_are_picked_up() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("JOB_POLL_INTERVAL", "5");
            jail.set_env("JOB_BATCH_SIZE", "10");

            let config = WorkerConfig::from_env().expect("config should load");
            assert_eq!(config.job_poll_interval, Duration::from_secs(5));
            assert_eq!(config.job_batch_size, 10);
            // unset variables keep their defaults
            assert_eq!(config.stale_check_interval, Duration::from_secs(3600));
            Ok(())
        });
    }
}
