//! Tier 2: Durability and crash recovery
//!
//! Committed allocations survive a restart. A crash mid-write loses only
//! the transaction being written, and the number it would have taken is
//! handed out again so the sequence stays gapless.

use crate::test_utils::*;
use buildseq::{DurabilityMode, WalTail};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

fn seed(test: &TestDb, series: &str, count: usize) {
    let executor = test.executor();
    for n in 0..count {
        assert_eq!(allocate(&executor, series, &commit(n)).status, 201);
    }
}

#[test]
fn allocations_survive_restart() {
    let test = TestDb::new();
    seed(&test, "5.0", 3);
    let before = list(&test.executor(), "5.0");

    let test = test.reopen();
    let stats = test.db.recovery_stats();
    assert!(stats.is_clean());
    assert_eq!(stats.txns_applied, 3);
    assert_eq!(stats.series_created, 1);
    assert_eq!(stats.builds_applied, 3);

    let executor = test.executor();
    assert_eq!(list(&executor, "5.0"), before);
    assert_eq!(allocate(&executor, "5.0", &commit(1)).status, 200);
    assert_eq!(allocate(&executor, "5.0", &commit(99)).build_number, Some(4));
}

#[test]
fn surrogate_ids_continue_after_restart() {
    let test = TestDb::new();
    seed(&test, "1.0", 1);
    seed(&test, "2.0", 1);
    let test = test.reopen();

    let response = allocate(&test.executor(), "3.0", &commit(0));
    assert_eq!(response.series_id, Some(3));
}

#[test]
fn torn_tail_loses_only_last_transaction() {
    let test = TestDb::new();
    seed(&test, "6.1", 3);

    let test = test.reopen_after(|closed| {
        let wal = OpenOptions::new()
            .write(true)
            .open(closed.wal_path())
            .unwrap();
        let len = wal.metadata().unwrap().len();
        wal.set_len(len - 3).unwrap();
    });

    let stats = test.db.recovery_stats();
    assert!(matches!(stats.tail, WalTail::Torn { .. }));
    assert_eq!(stats.txns_applied, 2);

    let executor = test.executor();
    assert_eq!(numbers(&list(&executor, "6.1")), vec![1, 2]);
    assert_eq!(lookup(&executor, "6.1", &commit(2)).status, 404);

    // The lost commit takes the freed number again
    let retried = allocate(&executor, "6.1", &commit(2));
    assert_eq!(retried.status, 201);
    assert_eq!(retried.build_number, Some(3));
    drop(executor);

    // The uncommitted prefix of the torn transaction stays in the log
    let test = test.reopen();
    let stats = test.db.recovery_stats();
    assert_eq!(stats.tail, WalTail::Clean);
    assert_eq!(stats.incomplete_txns, 1);
    assert_eq!(stats.txns_applied, 3);
    assert_eq!(numbers(&list(&test.executor(), "6.1")), vec![1, 2, 3]);
}

#[test]
fn corrupt_tail_is_discarded() {
    let test = TestDb::new();
    seed(&test, "7.0", 2);

    let test = test.reopen_after(|closed| {
        let mut wal = OpenOptions::new()
            .read(true)
            .write(true)
            .open(closed.wal_path())
            .unwrap();
        let mut last = [0u8; 1];
        wal.seek(SeekFrom::End(-1)).unwrap();
        wal.read_exact(&mut last).unwrap();
        wal.seek(SeekFrom::End(-1)).unwrap();
        wal.write_all(&[last[0] ^ 0xff]).unwrap();
    });

    let stats = test.db.recovery_stats();
    assert!(!stats.is_clean());
    assert_eq!(stats.txns_applied, 1);
    assert_eq!(numbers(&list(&test.executor(), "7.0")), vec![1]);
}

#[test]
fn always_mode_round_trip() {
    let config = BuildSeqConfig {
        durability: "always".into(),
        ..token_config()
    };
    let test = TestDb::with_config(config);
    assert_eq!(test.db.durability_mode(), Some(DurabilityMode::Always));
    seed(&test, "8.8", 4);

    let test = test.reopen();
    assert_eq!(test.db.durability_mode(), Some(DurabilityMode::Always));
    assert_eq!(numbers(&list(&test.executor(), "8.8")), vec![1, 2, 3, 4]);
}

#[test]
fn unauthorized_requests_leave_no_trace() {
    let test = TestDb::new();
    let executor = test.executor();
    let response = executor.execute(
        &Request::new(Method::Post)
            .with_series("1.0")
            .with_commit(commit(0))
            .with_token("wrong"),
    );
    assert_eq!(response.status, 401);
    drop(executor);

    let test = test.reopen();
    assert_eq!(test.db.recovery_stats().txns_applied, 0);
    assert_eq!(test.db.storage().series_count(), 0);
}
