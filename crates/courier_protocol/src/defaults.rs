//! Canonical default values applied when a status record must be fabricated.
//!
//! The configuration component normally fills every record field from the
//! host/directory configuration. These values are only reached when a record
//! has to be rebuilt from a connection's bookkeeping alone.

/// Parallel transfer ceiling per host.
pub const MAX_PARALLEL_JOBS_DEFAULT: usize = 5;
/// Consecutive transfer errors tolerated before a host is flagged as failing.
pub const DEFAULT_MAX_ERRORS: u32 = 10;
/// Seconds between retry attempts against an unreachable host.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 120;
/// Transfer block size in bytes.
pub const DEFAULT_TRANSFER_BLOCKSIZE: u32 = 4096;
/// Seconds before an individual transfer is abandoned.
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 120;
/// Seconds an idle control connection stays open. 0 closes after each use.
pub const DEFAULT_KEEP_CONNECTED_SECS: u64 = 0;
/// Concurrent retrieval processes per source directory.
pub const MAX_PROCESS_PER_DIR_DEFAULT: u32 = 10;
