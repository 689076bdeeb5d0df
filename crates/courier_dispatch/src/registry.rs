//! Per-worker-slot bookkeeping kept by the dispatching process.
//!
//! One fixed-size slot array, one entry per allowed parallel worker. Slots
//! are claimed when a job is handed out and freed when the worker exits.
//! The cached table positions inside an entry are weak references: a
//! configuration reload can invalidate them at any time, and only the
//! position resolver may rewrite them.

use courier_protocol::{StableId, TransferProtocol, WorkerSlot};
use serde::{Deserialize, Serialize};

/// One dispatched connection: which worker runs it, which host and
/// directory records it addresses, and where those records were last seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Connection {
    pub worker: WorkerSlot,
    pub host_id: StableId,
    pub host_alias: String,
    /// Last resolved Host Status Table position. None = unresolved.
    pub host_pos: Option<usize>,
    /// Last resolved Directory Status Table position. None = this
    /// connection has no retrieval side.
    pub dir_pos: Option<usize>,
    pub dir_alias: String,
    pub protocol: TransferProtocol,
    /// Index into the host record's job slots. None = no job slot held.
    pub job_number: Option<usize>,
    /// Transfer message name. Its leading hexadecimal run encodes the
    /// directory stable id.
    pub msg_name: String,
    /// Using the host's secondary address. Reset whenever a cached record
    /// is replaced by a placeholder.
    pub secondary_host: bool,
    /// True once a cached position points at a hidden record. Sticky until
    /// the slot is released.
    pub placeholder: bool,
}

/// Fixed-size array of connection slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRegistry {
    slots: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn with_slots(max_connections: usize) -> Self {
        Self {
            slots: vec![Connection::default(); max_connections],
        }
    }

    pub fn max_connections(&self) -> usize {
        self.slots.len()
    }

    /// Claim the first free slot for `connection`, returning its index.
    pub fn dispatch(&mut self, connection: Connection) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.worker.is_occupied())?;
        self.slots[index] = connection;
        Some(index)
    }

    /// Free the slot at `index`, returning the entry that occupied it.
    pub fn release(&mut self, index: usize) -> Option<Connection> {
        let slot = self.slots.get_mut(index)?;
        if !slot.worker.is_occupied() {
            return None;
        }
        Some(std::mem::take(slot))
    }

    pub fn get(&self, index: usize) -> Option<&Connection> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Connection> {
        self.slots.get_mut(index)
    }

    /// Occupied slots, in slot order.
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &Connection)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.worker.is_occupied())
    }

    pub fn iter_occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut Connection)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.worker.is_occupied())
    }
}

/// Parse the leading hexadecimal run of a message name as a stable id.
///
/// Parsing stops at the first non-hex character, or after the eight digits
/// a 32-bit id can carry. A name with no leading hex digits parses as id 0,
/// which collides with a legitimate id of 0 on the directory side; the
/// ambiguity comes with the message naming contract.
pub fn leading_hex_id(msg_name: &str) -> StableId {
    let end = msg_name
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(msg_name.len())
        .min(8);
    StableId(u32::from_str_radix(&msg_name[..end], 16).unwrap_or(0))
}
