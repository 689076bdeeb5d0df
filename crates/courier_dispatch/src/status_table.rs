//! Shared status tables and the lookup contract against them.
//!
//! A table is rebuilt wholesale by the configuration component, which may
//! reorder positions or drop stable ids entirely between one resolver pass
//! and the next. Consumers cache positions into the table and re-derive
//! them from stable ids when the table changes underneath them.
//!
//! The backing storage is mapped into worker processes that read it without
//! locks: every structural write must be followed by [`StatusTable::publish`]
//! before the corresponding cached position is stored where workers can see
//! it.

use courier_protocol::{DirStatus, HostStatus, StableId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{fence, Ordering};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("No overflow room past {count} enumerated records (allocation limit {limit})")]
    CapacityExhausted { count: usize, limit: usize },
}

/// Record shape stored in a status table.
pub trait StatusRecord {
    fn stable_id(&self) -> StableId;
    fn alias(&self) -> &str;
}

impl StatusRecord for HostStatus {
    fn stable_id(&self) -> StableId {
        self.stable_id
    }

    fn alias(&self) -> &str {
        &self.alias
    }
}

impl StatusRecord for DirStatus {
    fn stable_id(&self) -> StableId {
        self.stable_id
    }

    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Ordered collection of status records shared across processes.
///
/// `count` records are enumerated. The slot at index `count` is addressable
/// through [`StatusTable::append_hidden`] but excluded from every listing:
/// it carries work for a stable id that fell out of the enumerated set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTable<R> {
    records: Vec<R>,
    count: usize,
    /// Allocation ceiling of the backing segment.
    limit: usize,
    /// Bumped on every wholesale rebuild.
    generation: u64,
}

impl<R: StatusRecord> StatusTable<R> {
    /// Table whose enumerated set is exactly `records`, with room for one
    /// overflow record.
    pub fn new(records: Vec<R>) -> Self {
        let count = records.len();
        Self {
            records,
            count,
            limit: count + 1,
            generation: 0,
        }
    }

    /// Table with an explicit allocation ceiling, modeling the mapped
    /// segment size chosen by the configuration component. A limit equal to
    /// the record count leaves no overflow room.
    pub fn with_limit(records: Vec<R>, limit: usize) -> Self {
        let count = records.len();
        debug_assert!(limit >= count, "allocation limit below enumerated count");
        Self {
            records,
            count,
            limit: limit.max(count),
            generation: 0,
        }
    }

    /// Number of enumerated records.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Position of `stable_id` within the enumerated range.
    ///
    /// Side-effect free and deterministic: an absent id is a miss, never a
    /// fabricated position.
    pub fn find(&self, stable_id: StableId) -> Option<usize> {
        self.records[..self.count]
            .iter()
            .position(|record| record.stable_id() == stable_id)
    }

    /// Record at `pos`, including the hidden slot.
    pub fn get(&self, pos: usize) -> Option<&R> {
        self.records.get(pos)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut R> {
        self.records.get_mut(pos)
    }

    /// Enumerated records only. A hidden record is never yielded.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records[..self.count].iter()
    }

    /// The current hidden record, if one was appended since the last rebuild.
    pub fn hidden(&self) -> Option<&R> {
        self.records.get(self.count)
    }

    /// Write `record` one past the enumerated range and return its position.
    ///
    /// Does not change `count`, so the record stays addressable but
    /// invisible to enumeration. Overwrites whatever hidden record was
    /// there before. Fails when the allocation ceiling leaves no overflow
    /// room; the caller must surface that instead of writing out of bounds.
    pub fn append_hidden(&mut self, record: R) -> Result<usize> {
        if self.count >= self.limit {
            return Err(TableError::CapacityExhausted {
                count: self.count,
                limit: self.limit,
            });
        }
        if self.records.len() == self.count {
            self.records.push(record);
        } else {
            self.records[self.count] = record;
        }
        Ok(self.count)
    }

    /// Publish structural writes to the other processes mapping this table.
    ///
    /// Must run after `append_hidden` or a record-field write, before the
    /// corresponding cached position is stored where workers read it.
    pub fn publish(&self) {
        fence(Ordering::Release);
    }

    /// Wholesale replacement, as a configuration reload performs it. Any
    /// hidden record is dropped along with the old generation.
    pub fn rebuild(&mut self, records: Vec<R>) {
        self.count = records.len();
        self.limit = self.count + 1;
        self.records = records;
        self.generation += 1;
    }
}
