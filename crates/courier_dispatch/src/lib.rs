//! Courier Flow dispatcher library
//!
//! Holds the dispatcher-side view of the shared status tables: the tables
//! themselves, the per-worker-slot connection registry, and the position
//! resolver that re-derives every cached table position after a
//! configuration reload rebuilds a table underneath us.

pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod status_table;

pub use registry::{leading_hex_id, Connection, ConnectionRegistry};
pub use resolver::{resolve_positions, PassReport, ReclaimPolicy};
pub use snapshot::StateSnapshot;
pub use status_table::{StatusRecord, StatusTable, TableError};
