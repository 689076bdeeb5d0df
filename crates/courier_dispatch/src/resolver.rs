//! Position resolution for cached status-table references.
//!
//! A configuration reload can rebuild a status table with different
//! ordering, or drop a host/directory from the enumerated set entirely.
//! This pass walks the connection registry and re-derives every cached
//! position from its stable id. When an id cannot be found the pass falls
//! back to a hidden record past the enumerated range: a removed host and a
//! renamed host are indistinguishable from here, and dropping the job would
//! lose data every time an operator merely renamed an alias.
//!
//! The pass is single-threaded, never blocks, and never terminates the
//! process. Every outcome is either a cached-position update or the
//! documented hidden-slot fallback; only an exhausted table allocation
//! aborts the pass.

use courier_protocol::{DirStatus, HostStatus, TuningConfig};
use serde::Serialize;
use tracing::debug;

use crate::registry::{leading_hex_id, Connection, ConnectionRegistry};
use crate::status_table::{Result, StatusTable};

/// What to do with the hidden slot when a stable id keeps failing to
/// resolve across consecutive passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReclaimPolicy {
    /// Rewrite the hidden record from defaults on every failing pass, as
    /// the dispatcher has always done. Job-slot writes made between two
    /// failing passes are lost.
    #[default]
    Reinitialize,
    /// Keep a hidden record that already carries the wanted stable id,
    /// whether this connection or another one fabricated it.
    ReusePlaceholder,
}

/// Counters for one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub connections_seen: usize,
    pub hosts_repositioned: usize,
    pub host_fallbacks: usize,
    pub dirs_repositioned: usize,
    pub dir_fallbacks: usize,
}

/// Re-derive every cached table position in `registry` from its stable id.
///
/// Hits update the cached position and nothing else. Misses append a
/// defaulted hidden record, migrate job ownership where the connection
/// holds a job slot, and leave the connection flagged as a placeholder.
/// Outcomes are local to each entry; the pass only fails when a table has
/// no overflow room left.
pub fn resolve_positions(
    hosts: &mut StatusTable<HostStatus>,
    dirs: &mut StatusTable<DirStatus>,
    registry: &mut ConnectionRegistry,
    tuning: &TuningConfig,
    policy: ReclaimPolicy,
) -> Result<PassReport> {
    let mut report = PassReport::default();
    for (index, conn) in registry.iter_occupied_mut() {
        report.connections_seen += 1;
        resolve_host_side(hosts, index, conn, tuning, policy, &mut report)?;
        resolve_dir_side(dirs, index, conn, tuning, policy, &mut report)?;
    }
    Ok(report)
}

fn resolve_host_side(
    hosts: &mut StatusTable<HostStatus>,
    index: usize,
    conn: &mut Connection,
    tuning: &TuningConfig,
    policy: ReclaimPolicy,
    report: &mut PassReport,
) -> Result<()> {
    let old_pos = conn.host_pos;
    if let Some(new_pos) = hosts.find(conn.host_id) {
        if old_pos != Some(new_pos) {
            report.hosts_repositioned += 1;
        }
        conn.host_pos = Some(new_pos);
        return Ok(());
    }

    report.host_fallbacks += 1;
    debug!(
        host = %conn.host_alias,
        id = %conn.host_id,
        connection = index,
        pid = ?conn.worker.pid(),
        "Failed to locate host for connection job; writing data past the enumerated table"
    );
    conn.secondary_host = false;

    let hidden_matches =
        hosts.hidden().map(|record| record.stable_id) == Some(conn.host_id);
    if policy == ReclaimPolicy::ReusePlaceholder && hidden_matches {
        let new_pos = hosts.count();
        if !conn.placeholder {
            // Another connection fabricated the record; this one still has
            // to move its own job slot across.
            migrate_job_slot(hosts, conn, old_pos, new_pos);
            hosts.publish();
            conn.placeholder = true;
        }
        conn.host_pos = Some(new_pos);
        return Ok(());
    }

    let new_pos = hosts.append_hidden(HostStatus::placeholder(
        &conn.host_alias,
        conn.host_id,
        tuning,
    ))?;
    hosts.publish();
    conn.placeholder = true;

    migrate_job_slot(hosts, conn, old_pos, new_pos);
    hosts.publish();
    conn.host_pos = Some(new_pos);
    Ok(())
}

/// Move job ownership from the old table position to the hidden record.
///
/// The old slot is freed first so the record now at that position can hand
/// the job number out again; a held slot there would starve dispatching for
/// whichever host inherited the position. Ownership at the new position is
/// only asserted for a worker that has actually been spawned, but the
/// unique name is always carried over so the in-flight message stays
/// correlated.
fn migrate_job_slot(
    hosts: &mut StatusTable<HostStatus>,
    conn: &Connection,
    old_pos: Option<usize>,
    new_pos: usize,
) {
    let Some(job_number) = conn.job_number else {
        return;
    };
    if let Some(slot) = old_pos
        .and_then(|pos| hosts.get_mut(pos))
        .and_then(|record| record.job_slots.get_mut(job_number))
    {
        slot.clear();
    }
    if let Some(slot) = hosts
        .get_mut(new_pos)
        .and_then(|record| record.job_slots.get_mut(job_number))
    {
        slot.owner_pid = conn.worker.pid();
        slot.unique_name = conn.msg_name.clone();
    }
}

fn resolve_dir_side(
    dirs: &mut StatusTable<DirStatus>,
    index: usize,
    conn: &mut Connection,
    tuning: &TuningConfig,
    policy: ReclaimPolicy,
    report: &mut PassReport,
) -> Result<()> {
    if conn.dir_pos.is_none() {
        return Ok(());
    }

    let dir_id = leading_hex_id(&conn.msg_name);
    if let Some(new_pos) = dirs.find(dir_id) {
        if conn.dir_pos != Some(new_pos) {
            report.dirs_repositioned += 1;
        }
        conn.dir_pos = Some(new_pos);
        return Ok(());
    }

    report.dir_fallbacks += 1;
    debug!(
        dir = %conn.dir_alias,
        id = %dir_id,
        connection = index,
        pid = ?conn.worker.pid(),
        "Failed to locate directory for connection job; writing data past the enumerated table"
    );
    conn.secondary_host = false;

    let hidden_matches =
        dirs.hidden().map(|record| record.stable_id) == Some(dir_id);
    if policy == ReclaimPolicy::ReusePlaceholder && hidden_matches {
        conn.placeholder = true;
        conn.dir_pos = Some(dirs.count());
        return Ok(());
    }

    let new_pos = dirs.append_hidden(DirStatus::placeholder(
        &conn.dir_alias,
        dir_id,
        conn.protocol,
        tuning,
    ))?;
    dirs.publish();
    conn.placeholder = true;
    conn.dir_pos = Some(new_pos);
    Ok(())
}
