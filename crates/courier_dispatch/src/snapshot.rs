//! On-disk snapshot of dispatcher state for offline replay.
//!
//! Live tables belong to the configuration component's mapped segments;
//! a snapshot is the same state captured as JSON so a resolution pass can
//! be replayed and inspected without the rest of the suite running.

use anyhow::{Context, Result};
use courier_protocol::{DirStatus, HostStatus};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::registry::ConnectionRegistry;
use crate::status_table::StatusTable;

/// Everything a resolver pass touches, captured at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub hosts: StatusTable<HostStatus>,
    pub dirs: StatusTable<DirStatus>,
    pub connections: ConnectionRegistry,
}

impl StateSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))
    }
}
