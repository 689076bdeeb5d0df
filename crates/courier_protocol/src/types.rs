//! Status record shapes shared across the Courier Flow daemons.
//!
//! These are the per-host and per-directory records every process in the
//! suite reads out of the shared Host Status Table and Directory Status
//! Table. String fields are bounded because the tables live in a mapped
//! segment with fixed-size fields; constructors truncate rather than fail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::TuningConfig;

// ============================================================================
// Field limits
// ============================================================================

/// Maximum length of a host alias stored in a host record.
pub const MAX_HOST_ALIAS_LEN: usize = 16;
/// Maximum length of a directory alias stored in a directory record.
pub const MAX_DIR_ALIAS_LEN: usize = 32;
/// Maximum length of a transfer message name.
pub const MAX_MSG_NAME_LEN: usize = 64;

fn bounded(value: &str, max: usize) -> String {
    let mut end = value.len().min(max);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier for a host or directory that survives table rebuilds.
///
/// Contrasted with a table position, which does not. Assigned by the
/// configuration component and unique within one table generation.
/// Renders as lowercase hex, which is how operators grep for it in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StableId(pub u32);

impl StableId {
    /// Also what a malformed message name parses to, so an id of zero is
    /// ambiguous on the directory side.
    pub const ZERO: StableId = StableId(0);

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

// ============================================================================
// Canonical enums
// ============================================================================

/// Transfer protocol tag carried by directory records and connections.
/// This is the CANONICAL definition - use this everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferProtocol {
    #[default]
    Ftp,
    Ftps,
    Sftp,
    Http,
    Smtp,
    /// Local filesystem copy.
    Local,
    /// Hand the file to an external command.
    Exec,
}

impl TransferProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferProtocol::Ftp => "ftp",
            TransferProtocol::Ftps => "ftps",
            TransferProtocol::Sftp => "sftp",
            TransferProtocol::Http => "http",
            TransferProtocol::Smtp => "smtp",
            TransferProtocol::Local => "local",
            TransferProtocol::Exec => "exec",
        }
    }
}

impl fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ftp" => Ok(TransferProtocol::Ftp),
            "ftps" => Ok(TransferProtocol::Ftps),
            "sftp" => Ok(TransferProtocol::Sftp),
            "http" => Ok(TransferProtocol::Http),
            "smtp" => Ok(TransferProtocol::Smtp),
            "local" => Ok(TransferProtocol::Local),
            "exec" => Ok(TransferProtocol::Exec),
            _ => Err(format!("Invalid transfer protocol: '{}'", s)),
        }
    }
}

/// Dispatcher's view of one worker process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerSlot {
    /// No connection occupies the slot.
    #[default]
    Free,
    /// A job was handed out but the worker process has not been spawned yet.
    Starting,
    /// Worker process running under this pid.
    Running(u32),
}

impl WorkerSlot {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, WorkerSlot::Free)
    }

    /// Pid of a running worker, if one exists yet.
    pub fn pid(&self) -> Option<u32> {
        match self {
            WorkerSlot::Running(pid) => Some(*pid),
            _ => None,
        }
    }
}

// ============================================================================
// Job slots
// ============================================================================

/// Per-job-number bookkeeping cell inside a host record.
///
/// Tracks which worker process currently owns a given in-flight transfer.
/// Under burst continuation a worker reuses the correlation fields across
/// consecutive transfers to the same host without releasing the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobSlot {
    /// Process currently responsible for this job. None = no owner.
    pub owner_pid: Option<u32>,
    /// Correlates this slot to a specific in-flight transfer message.
    pub unique_name: String,
    /// Burst-continuation correlation id. None = unset.
    pub job_id: Option<u32>,
}

impl JobSlot {
    pub fn vacant() -> Self {
        Self::default()
    }

    /// Release the slot, including the burst-continuation fields.
    pub fn clear(&mut self) {
        self.owner_pid = None;
        self.unique_name.clear();
        self.job_id = None;
    }
}

// ============================================================================
// Status records
// ============================================================================

/// One operational record per host in the Host Status Table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    pub alias: String,
    pub stable_id: StableId,
    /// Concurrency ceiling; also the length of `job_slots`.
    pub allowed_transfers: usize,
    pub max_errors: u32,
    pub retry_interval_secs: u64,
    pub block_size: u32,
    pub transfer_timeout_secs: u64,
    /// Seconds to keep an idle control connection open. 0 = close after use.
    pub keep_connected_secs: u64,
    pub active_transfers: u32,
    /// Indexed by the dispatcher-private job number.
    pub job_slots: Vec<JobSlot>,
}

impl HostStatus {
    pub fn new(alias: &str, stable_id: StableId, tuning: &TuningConfig) -> Self {
        Self {
            alias: bounded(alias, MAX_HOST_ALIAS_LEN),
            stable_id,
            allowed_transfers: tuning.max_parallel_jobs,
            max_errors: tuning.max_errors,
            retry_interval_secs: tuning.retry_interval_secs,
            block_size: tuning.transfer_blocksize,
            transfer_timeout_secs: tuning.transfer_timeout_secs,
            keep_connected_secs: tuning.keep_connected_secs,
            active_transfers: 0,
            job_slots: vec![JobSlot::vacant(); tuning.max_parallel_jobs],
        }
    }

    /// Record fabricated for a host that fell out of the enumerated table.
    ///
    /// The connection being resolved is the only occupant we know of at
    /// this point.
    pub fn placeholder(alias: &str, stable_id: StableId, tuning: &TuningConfig) -> Self {
        let mut record = Self::new(alias, stable_id, tuning);
        record.active_transfers = 1;
        record
    }
}

/// One operational record per source directory in the Directory Status Table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirStatus {
    pub alias: String,
    pub stable_id: StableId,
    pub protocol: TransferProtocol,
    /// Concurrent retrieval process ceiling for this directory.
    pub max_process: u32,
    pub max_errors: u32,
    pub active_process: u32,
}

impl DirStatus {
    pub fn new(
        alias: &str,
        stable_id: StableId,
        protocol: TransferProtocol,
        tuning: &TuningConfig,
    ) -> Self {
        Self {
            alias: bounded(alias, MAX_DIR_ALIAS_LEN),
            stable_id,
            protocol,
            max_process: tuning.max_process_per_dir,
            max_errors: tuning.max_errors,
            active_process: 0,
        }
    }

    /// Record fabricated for a directory that fell out of the enumerated
    /// table. Directory records carry no per-connection job slots, so
    /// nothing beyond the defaults needs seeding.
    pub fn placeholder(
        alias: &str,
        stable_id: StableId,
        protocol: TransferProtocol,
        tuning: &TuningConfig,
    ) -> Self {
        Self::new(alias, stable_id, protocol, tuning)
    }
}
