//! Per-instance configuration for the record store and the scheduler.
//!
//! Both structs deserialize from JSON with every field optional; durations
//! are given in milliseconds.
//!
//! ```rust
//! use mcmc_chains::SchedulerConfig;
//! use std::time::Duration;
//!
//! let config = SchedulerConfig::default()
//!     .seeds(vec![0, 1, 2])
//!     .poll_interval(Duration::from_millis(50))
//!     .deadline(Duration::from_secs(3600));
//! assert!(config.validate().is_ok());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File naming used for claim records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunsNaming {
    /// `run_tau<step>_<hash>_seed<seed>.json`, parseable by the scan path.
    #[default]
    Unified,
    /// `results_tau<step>_<hash>_seed<seed>.json`, as written by older data
    /// directories. Only exact-key lookups find these claims.
    Legacy,
}

/// Record store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Claim file naming.
    pub runs_naming: RunsNaming,
}

impl StoreConfig {
    /// Set the claim naming.
    #[must_use]
    pub const fn runs_naming(mut self, runs_naming: RunsNaming) -> Self {
        self.runs_naming = runs_naming;
        self
    }
}

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seeds to schedule; each one forms an independent chain per input.
    pub seeds: Vec<u64>,
    /// First sleep after a full queue rotation made no progress.
    pub poll_interval_ms: u64,
    /// Upper bound for the doubling backoff.
    pub max_backoff_ms: u64,
    /// Stop the run after this long, leaving unfinished tasks queued.
    pub deadline_ms: Option<u64>,
    /// Worker id written into claims; random when unset.
    pub worker_id: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            seeds: vec![0],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            deadline_ms: None,
            worker_id: None,
        }
    }
}

impl SchedulerConfig {
    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the seeds.
    #[must_use]
    pub fn seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Set the base poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the backoff cap.
    #[must_use]
    pub fn max_backoff(mut self, cap: Duration) -> Self {
        self.max_backoff_ms = duration_ms(cap);
        self
    }

    /// Set a deadline for `run`.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(duration_ms(deadline));
        self
    }

    /// Fix the worker id.
    #[must_use]
    pub fn worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Base poll interval.
    #[must_use]
    pub const fn poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Backoff cap.
    #[must_use]
    pub const fn max_backoff_duration(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Deadline, if any.
    #[must_use]
    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty seed list or a poll
    /// interval above the backoff cap.
    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(Error::Configuration("at least one seed is required".into()));
        }
        if self.poll_interval_ms > self.max_backoff_ms {
            return Err(Error::Configuration(format!(
                "poll interval {}ms exceeds max backoff {}ms",
                self.poll_interval_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
