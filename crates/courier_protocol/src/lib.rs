//! Shared types for the Courier Flow daemon suite.
//!
//! Everything the dispatcher and the table-building configuration component
//! agree on lives here: the record shapes stored in the shared status
//! tables, the canonical defaults applied when a record must be fabricated,
//! and the tuning configuration that overrides them.

pub mod config;
pub mod defaults;
pub mod types;

pub use config::TuningConfig;
pub use types::{
    DirStatus, HostStatus, JobSlot, StableId, TransferProtocol, WorkerSlot, MAX_DIR_ALIAS_LEN,
    MAX_HOST_ALIAS_LEN, MAX_MSG_NAME_LEN,
};
