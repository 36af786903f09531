//! Tier 3: Concurrent allocation
//!
//! Many clients racing on one series must still produce a dense, duplicate
//! free sequence, and clients racing on one commit must agree on its number.

use crate::test_utils::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn distinct_commits_race_without_gaps() {
    // Default retry policy: distinct commits must never need a retry
    assert_eq!(RetryConfig::default().max_retries, 3);
    let executor = ephemeral_executor();
    let per_thread = 200;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let executor = executor.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..per_thread)
                    .map(|i| {
                        let c = commit(t * 1000 + i);
                        let response = allocate(&executor, "10.0", &c);
                        assert_eq!(response.status, 201, "{:?}", response);
                        (c, response.build_number.unwrap())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut assigned = HashMap::new();
    for handle in handles {
        for (c, number) in handle.join().unwrap() {
            assert!(assigned.insert(c, number).is_none());
        }
    }

    let unique: HashSet<u16> = assigned.values().copied().collect();
    assert_eq!(unique.len(), THREADS * per_thread);
    assert_eq!(
        numbers(&list(&executor, "10.0")),
        (1..=(THREADS * per_thread) as u16).collect::<Vec<_>>()
    );
    for (c, number) in &assigned {
        assert_eq!(lookup(&executor, "10.0", c).build_number, Some(*number));
    }
}

#[test]
fn same_commit_race_agrees_on_number() {
    let executor = ephemeral_executor();
    for round in 0..10 {
        let series = format!("11.{}", round);
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let executor = executor.clone();
                let barrier = Arc::clone(&barrier);
                let series = series.clone();
                thread::spawn(move || {
                    barrier.wait();
                    allocate(&executor, &series, &commit(42))
                })
            })
            .collect();
        let responses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = responses.iter().filter(|r| r.status == 201).count();
        assert_eq!(created, 1, "round {}", round);
        for response in &responses {
            match response.status {
                200 | 201 => assert_eq!(response.build_number, Some(1)),
                409 => {
                    assert_eq!(response.message, "Commit does already exist in series!");
                    assert_eq!(response.build_number, Some(1));
                }
                other => panic!("unexpected status {}: {:?}", other, response),
            }
        }
        assert_eq!(numbers(&list(&executor, &series)), vec![1]);
    }
}

#[test]
fn independent_series_do_not_interfere() {
    let executor = ephemeral_executor();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let executor = executor.clone();
            thread::spawn(move || {
                let series = format!("12.{}", t);
                for i in 0..20 {
                    let response = allocate(&executor, &series, &commit(i));
                    assert_eq!(response.build_number, Some(i as u16 + 1));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..THREADS {
        assert_eq!(
            numbers(&list(&executor, &format!("12.{}", t))),
            (1..=20).collect::<Vec<u16>>()
        );
    }
    let metrics = executor.allocator().database().metrics();
    assert_eq!(metrics.active_count, 0);
    assert_eq!(metrics.total_aborted, 0);
}

#[test]
fn concurrent_durable_allocations_replay_in_order() {
    let test = TestDb::new();
    {
        let executor = test.executor();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let executor = executor.clone();
                thread::spawn(move || {
                    for i in 0..15 {
                        let response = allocate(&executor, "13.0", &commit(t * 100 + i));
                        assert_eq!(response.status, 201);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
    let before = list(&test.executor(), "13.0");

    let test = test.reopen();
    assert!(test.db.recovery_stats().is_clean());
    assert_eq!(list(&test.executor(), "13.0"), before);
    assert_eq!(numbers(&before), (1..=60).collect::<Vec<u16>>());
}
