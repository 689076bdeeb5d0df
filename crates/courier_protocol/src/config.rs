//! Dispatcher tuning configuration.
//!
//! Every default the resolver may stamp into a fabricated record is a
//! recognized option here. A partial JSON file overrides only the fields it
//! names; `COURIER_*` environment variables override on top of that.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::defaults;

/// Tunable defaults for status records, with canonical fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TuningConfig {
    pub max_parallel_jobs: usize,
    pub max_errors: u32,
    pub retry_interval_secs: u64,
    pub transfer_blocksize: u32,
    pub transfer_timeout_secs: u64,
    pub keep_connected_secs: u64,
    pub max_process_per_dir: u32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: defaults::MAX_PARALLEL_JOBS_DEFAULT,
            max_errors: defaults::DEFAULT_MAX_ERRORS,
            retry_interval_secs: defaults::DEFAULT_RETRY_INTERVAL_SECS,
            transfer_blocksize: defaults::DEFAULT_TRANSFER_BLOCKSIZE,
            transfer_timeout_secs: defaults::DEFAULT_TRANSFER_TIMEOUT_SECS,
            keep_connected_secs: defaults::DEFAULT_KEEP_CONNECTED_SECS,
            max_process_per_dir: defaults::MAX_PROCESS_PER_DIR_DEFAULT,
        }
    }
}

impl TuningConfig {
    /// Load a JSON tuning file. Unnamed fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tuning config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse tuning config: {}", path.display()))
    }

    /// Defaults plus `COURIER_*` environment overrides.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Apply `COURIER_*` environment overrides on top of `self`.
    ///
    /// Unparseable values are ignored with a warning, never fatal.
    pub fn apply_env(mut self) -> Self {
        apply_var("COURIER_MAX_PARALLEL_JOBS", &mut self.max_parallel_jobs);
        apply_var("COURIER_MAX_ERRORS", &mut self.max_errors);
        apply_var("COURIER_RETRY_INTERVAL", &mut self.retry_interval_secs);
        apply_var("COURIER_BLOCKSIZE", &mut self.transfer_blocksize);
        apply_var("COURIER_TRANSFER_TIMEOUT", &mut self.transfer_timeout_secs);
        apply_var("COURIER_MAX_PROCESS_PER_DIR", &mut self.max_process_per_dir);
        self
    }
}

fn apply_var<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring unparseable {}={}", name, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.max_parallel_jobs, defaults::MAX_PARALLEL_JOBS_DEFAULT);
        assert_eq!(tuning.max_errors, defaults::DEFAULT_MAX_ERRORS);
        assert_eq!(tuning.retry_interval_secs, defaults::DEFAULT_RETRY_INTERVAL_SECS);
        assert_eq!(tuning.transfer_blocksize, defaults::DEFAULT_TRANSFER_BLOCKSIZE);
        assert_eq!(tuning.max_process_per_dir, defaults::MAX_PROCESS_PER_DIR_DEFAULT);
    }

    #[test]
    fn test_partial_file_overrides_named_fields_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_errors": 3, "transfer_blocksize": 65536}}"#).unwrap();

        let tuning = TuningConfig::load(file.path()).unwrap();
        assert_eq!(tuning.max_errors, 3);
        assert_eq!(tuning.transfer_blocksize, 65536);
        assert_eq!(tuning.max_parallel_jobs, defaults::MAX_PARALLEL_JOBS_DEFAULT);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_errors = 3").unwrap();
        assert!(TuningConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        std::env::set_var("COURIER_MAX_ERRORS", "7");
        std::env::set_var("COURIER_RETRY_INTERVAL", "not-a-number");
        let tuning = TuningConfig::default().apply_env();
        std::env::remove_var("COURIER_MAX_ERRORS");
        std::env::remove_var("COURIER_RETRY_INTERVAL");

        assert_eq!(tuning.max_errors, 7);
        assert_eq!(tuning.retry_interval_secs, defaults::DEFAULT_RETRY_INTERVAL_SECS);
    }
}
