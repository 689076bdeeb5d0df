//! Resolution-pass scenarios: reordered tables, removed hosts and
//! directories, and the hidden-slot fallback that keeps in-flight jobs
//! alive across all of them.

use courier_dispatch::registry::{Connection, ConnectionRegistry};
use courier_dispatch::resolver::{resolve_positions, ReclaimPolicy};
use courier_dispatch::status_table::{StatusTable, TableError};
use courier_protocol::{
    DirStatus, HostStatus, StableId, TransferProtocol, TuningConfig, WorkerSlot,
};

const SERVER_A: StableId = StableId(0x1234);

fn tuning() -> TuningConfig {
    TuningConfig::default()
}

fn host(alias: &str, id: u32) -> HostStatus {
    HostStatus::new(alias, StableId(id), &tuning())
}

fn dir(alias: &str, id: u32) -> DirStatus {
    DirStatus::new(alias, StableId(id), TransferProtocol::Ftp, &tuning())
}

/// Five hosts, none of them serverA.
fn hosts_without_server_a() -> StatusTable<HostStatus> {
    StatusTable::new(vec![
        host("mailgate", 0x10),
        host("mirror-1", 0x11),
        host("mirror-2", 0x12),
        host("archive", 0x13),
        host("backup", 0x14),
    ])
}

fn server_a_connection() -> Connection {
    Connection {
        worker: WorkerSlot::Running(500),
        host_id: SERVER_A,
        host_alias: "serverA".to_string(),
        host_pos: Some(1),
        job_number: Some(2),
        msg_name: "46a1b2c3/0/8f31ab".to_string(),
        ..Connection::default()
    }
}

fn registry_with(connections: Vec<Connection>) -> ConnectionRegistry {
    let mut registry = ConnectionRegistry::with_slots(connections.len().max(4));
    for conn in connections {
        registry.dispatch(conn).expect("free slot");
    }
    registry
}

fn empty_dirs() -> StatusTable<DirStatus> {
    StatusTable::new(Vec::new())
}

#[test]
fn removed_host_moves_job_to_hidden_record() {
    let mut hosts = hosts_without_server_a();
    // Stale leftover from before the reload: the record now sitting at the
    // connection's old position still shows the job as owned.
    hosts.get_mut(1).unwrap().job_slots[2].owner_pid = Some(500);
    hosts.get_mut(1).unwrap().job_slots[2].unique_name = "46a1b2c3/0/8f31ab".to_string();

    let mut dirs = empty_dirs();
    let mut registry = registry_with(vec![server_a_connection()]);

    let report = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();
    assert_eq!(report.host_fallbacks, 1);

    // Count unchanged; the fabricated record sits one past the enumerated
    // range and never shows up in a listing.
    assert_eq!(hosts.count(), 5);
    assert!(hosts.iter().all(|r| r.stable_id != SERVER_A));

    let hidden = hosts.hidden().expect("hidden record");
    assert_eq!(hidden.alias, "serverA");
    assert_eq!(hidden.stable_id, SERVER_A);
    assert_eq!(hidden.allowed_transfers, tuning().max_parallel_jobs);
    assert_eq!(hidden.max_errors, tuning().max_errors);
    assert_eq!(hidden.retry_interval_secs, tuning().retry_interval_secs);
    assert_eq!(hidden.block_size, tuning().transfer_blocksize);
    assert_eq!(hidden.transfer_timeout_secs, tuning().transfer_timeout_secs);
    assert_eq!(hidden.keep_connected_secs, 0);
    assert_eq!(hidden.active_transfers, 1);

    // Old slot freed, new slot owned, message name carried over.
    let old_slot = &hosts.get(1).unwrap().job_slots[2];
    assert_eq!(old_slot.owner_pid, None);
    assert!(old_slot.unique_name.is_empty());
    assert_eq!(old_slot.job_id, None);

    let new_slot = &hosts.get(5).unwrap().job_slots[2];
    assert_eq!(new_slot.owner_pid, Some(500));
    assert_eq!(new_slot.unique_name, "46a1b2c3/0/8f31ab");

    let conn = registry.get(0).unwrap();
    assert_eq!(conn.host_pos, Some(5));
    assert!(conn.placeholder);
    assert!(!conn.secondary_host);
}

#[test]
fn reordered_host_only_updates_cached_position() {
    let mut hosts = StatusTable::new(vec![
        host("mailgate", 0x10),
        host("mirror-1", 0x11),
        host("mirror-2", 0x12),
        host("serverA", SERVER_A.as_u32()),
        host("backup", 0x14),
    ]);
    let before = hosts.clone();

    let mut dirs = empty_dirs();
    let mut registry = registry_with(vec![server_a_connection()]);

    let report = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    assert_eq!(report.hosts_repositioned, 1);
    assert_eq!(report.host_fallbacks, 0);
    let conn = registry.get(0).unwrap();
    assert_eq!(conn.host_pos, Some(3));
    assert!(!conn.placeholder);

    // A hit is a pure pointer update: no record content changes.
    assert_eq!(hosts.count(), before.count());
    for pos in 0..hosts.count() {
        assert_eq!(hosts.get(pos), before.get(pos));
    }
    assert!(hosts.hidden().is_none());
}

#[test]
fn directory_id_resolves_from_message_name() {
    let mut hosts = StatusTable::new(vec![host("serverA", SERVER_A.as_u32())]);
    let mut dirs = StatusTable::new(vec![
        dir("outbound", 0x77),
        dir("spool", 0x78),
        dir("inbound-wx", 0x1a2b3c4d),
    ]);

    let mut conn = server_a_connection();
    conn.host_pos = Some(0);
    conn.job_number = None;
    conn.msg_name = "1a2b3c4d0001".to_string();
    conn.dir_pos = Some(0);
    conn.dir_alias = "inbound-wx".to_string();
    let mut registry = registry_with(vec![conn]);

    let report = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    assert_eq!(report.dirs_repositioned, 1);
    assert_eq!(report.dir_fallbacks, 0);
    assert_eq!(registry.get(0).unwrap().dir_pos, Some(2));
}

#[test]
fn removed_directory_falls_back_to_hidden_record() {
    let mut hosts = StatusTable::new(vec![host("serverA", SERVER_A.as_u32())]);
    let mut dirs = StatusTable::new(vec![dir("outbound", 0x77), dir("spool", 0x78)]);

    let mut conn = server_a_connection();
    conn.host_pos = Some(0);
    conn.job_number = None;
    conn.msg_name = "1a2b3c4d/0001".to_string();
    conn.dir_pos = Some(1);
    conn.dir_alias = "inbound-wx".to_string();
    conn.protocol = TransferProtocol::Sftp;
    let mut registry = registry_with(vec![conn]);

    let report = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    assert_eq!(report.dir_fallbacks, 1);
    assert_eq!(dirs.count(), 2);

    let hidden = dirs.hidden().expect("hidden record");
    assert_eq!(hidden.alias, "inbound-wx");
    assert_eq!(hidden.stable_id, StableId(0x1a2b3c4d));
    assert_eq!(hidden.protocol, TransferProtocol::Sftp);
    assert_eq!(hidden.max_process, tuning().max_process_per_dir);
    assert_eq!(hidden.max_errors, tuning().max_errors);

    let conn = registry.get(0).unwrap();
    assert_eq!(conn.dir_pos, Some(2));
    assert!(conn.placeholder);
}

#[test]
fn malformed_message_name_degrades_to_id_zero() {
    let mut hosts = StatusTable::new(vec![host("serverA", SERVER_A.as_u32())]);
    let mut dirs = StatusTable::new(vec![dir("outbound", 0x77)]);

    let mut conn = server_a_connection();
    conn.host_pos = Some(0);
    conn.job_number = None;
    conn.msg_name = "no-hex-here".to_string();
    conn.dir_pos = Some(0);
    conn.dir_alias = "mystery".to_string();
    let mut registry = registry_with(vec![conn]);

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    assert_eq!(dirs.hidden().unwrap().stable_id, StableId::ZERO);
}

#[test]
fn unspawned_worker_gets_no_ownership_but_keeps_correlation() {
    let mut hosts = hosts_without_server_a();
    let mut dirs = empty_dirs();
    let mut conn = server_a_connection();
    conn.worker = WorkerSlot::Starting;
    let mut registry = registry_with(vec![conn]);

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    let new_slot = &hosts.get(5).unwrap().job_slots[2];
    assert_eq!(new_slot.owner_pid, None);
    assert_eq!(new_slot.unique_name, "46a1b2c3/0/8f31ab");
}

#[test]
fn reinitialize_policy_wipes_interpass_progress() {
    let mut hosts = hosts_without_server_a();
    let mut dirs = empty_dirs();
    let mut registry = registry_with(vec![server_a_connection()]);
    let tuning = tuning();

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    // Burst continuation advances the slot between two maintenance passes.
    let slot = &mut hosts.get_mut(5).unwrap().job_slots[2];
    slot.job_id = Some(99);
    slot.unique_name = "46a1b2c3/0/next".to_string();

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();

    // Pinned: the second failing pass rewrites the hidden record from
    // defaults and re-migrates, erasing the progress above.
    let slot = &hosts.get(5).unwrap().job_slots[2];
    assert_eq!(slot.job_id, None);
    assert_eq!(slot.unique_name, "46a1b2c3/0/8f31ab");
    assert_eq!(hosts.hidden().unwrap().active_transfers, 1);
}

#[test]
fn reuse_policy_preserves_interpass_progress() {
    let mut hosts = hosts_without_server_a();
    let mut dirs = empty_dirs();
    let mut registry = registry_with(vec![server_a_connection()]);
    let tuning = tuning();

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::ReusePlaceholder,
    )
    .unwrap();
    assert_eq!(registry.get(0).unwrap().host_pos, Some(5));

    let slot = &mut hosts.get_mut(5).unwrap().job_slots[2];
    slot.job_id = Some(99);
    slot.unique_name = "46a1b2c3/0/next".to_string();

    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::ReusePlaceholder,
    )
    .unwrap();

    let slot = &hosts.get(5).unwrap().job_slots[2];
    assert_eq!(slot.job_id, Some(99));
    assert_eq!(slot.unique_name, "46a1b2c3/0/next");
    assert_eq!(registry.get(0).unwrap().host_pos, Some(5));
}

#[test]
fn two_connections_share_one_hidden_slot() {
    let mut hosts = hosts_without_server_a();
    let mut dirs = empty_dirs();

    let first = server_a_connection();
    let mut second = server_a_connection();
    second.worker = WorkerSlot::Running(501);
    second.job_number = Some(3);
    second.msg_name = "46a1b2c3/0/9c44de".to_string();
    let mut registry = registry_with(vec![first, second]);

    // Faithful reading: the second miss reinitializes the shared hidden
    // slot, erasing the first connection's migrated job slot.
    let mut reinit_hosts = hosts.clone();
    resolve_positions(
        &mut reinit_hosts,
        &mut dirs,
        &mut registry.clone(),
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();
    let record = reinit_hosts.hidden().unwrap();
    assert_eq!(record.job_slots[2].owner_pid, None);
    assert_eq!(record.job_slots[3].owner_pid, Some(501));

    // Reuse reading: both connections land in the same record and both
    // job slots survive.
    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::ReusePlaceholder,
    )
    .unwrap();
    let record = hosts.hidden().unwrap();
    assert_eq!(record.job_slots[2].owner_pid, Some(500));
    assert_eq!(record.job_slots[3].owner_pid, Some(501));
    assert_eq!(registry.get(0).unwrap().host_pos, Some(5));
    assert_eq!(registry.get(1).unwrap().host_pos, Some(5));
}

#[test]
fn exhausted_table_surfaces_capacity_error() {
    let records = vec![host("mailgate", 0x10)];
    let mut hosts = StatusTable::with_limit(records, 1);
    let mut dirs = empty_dirs();
    let mut registry = registry_with(vec![server_a_connection()]);

    let err = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap_err();
    assert_eq!(err, TableError::CapacityExhausted { count: 1, limit: 1 });
}

#[test]
fn free_slots_are_ignored() {
    let mut hosts = hosts_without_server_a();
    let mut dirs = empty_dirs();
    // Nothing dispatched: a full pass sees no connections and touches
    // nothing.
    let mut registry = ConnectionRegistry::with_slots(8);

    let report = resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning(),
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();
    assert_eq!(report.connections_seen, 0);
    assert!(hosts.hidden().is_none());
}

#[test]
fn rebuild_then_resolve_recovers_every_entry() {
    let tuning = tuning();
    let mut hosts = StatusTable::new(vec![
        host("serverA", SERVER_A.as_u32()),
        host("mirror-1", 0x11),
    ]);
    let mut dirs = empty_dirs();

    let mut conn = server_a_connection();
    conn.host_pos = Some(0);
    let mut registry = registry_with(vec![conn]);

    // Reload shuffles serverA to the back.
    hosts.rebuild(vec![
        host("mirror-1", 0x11),
        host("mirror-2", 0x12),
        host("serverA", SERVER_A.as_u32()),
    ]);
    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();
    assert_eq!(registry.get(0).unwrap().host_pos, Some(2));

    // A later reload drops it; the same connection survives on the hidden
    // slot.
    hosts.rebuild(vec![host("mirror-1", 0x11)]);
    resolve_positions(
        &mut hosts,
        &mut dirs,
        &mut registry,
        &tuning,
        ReclaimPolicy::Reinitialize,
    )
    .unwrap();
    let conn = registry.get(0).unwrap();
    assert_eq!(conn.host_pos, Some(1));
    assert!(conn.placeholder);
    assert_eq!(hosts.hidden().unwrap().stable_id, SERVER_A);
}
