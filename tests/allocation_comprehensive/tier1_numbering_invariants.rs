//! Tier 1: Numbering invariants
//!
//! Numbers within a series start at 1, follow first-request order with no
//! gaps, never change once assigned, and series never share a counter.

use crate::test_utils::*;
use buildseq::{AllocationOutcome, Allocator, SeriesKey};

#[test]
fn numbers_are_dense_and_ordered() {
    let executor = ephemeral_executor();
    for n in 0..50 {
        let response = allocate(&executor, "4.2", &commit(n));
        assert_eq!(response.status, 201);
        assert_eq!(response.build_number, Some(n as u16 + 1));
    }
    assert_eq!(
        numbers(&list(&executor, "4.2")),
        (1..=50).collect::<Vec<u16>>()
    );
}

#[test]
fn repeated_requests_are_stable() {
    let executor = ephemeral_executor();
    for n in 0..5 {
        allocate(&executor, "1.0", &commit(n));
    }
    for round in 0..3 {
        for n in 0..5 {
            let response = allocate(&executor, "1.0", &commit(n));
            assert_eq!(response.status, 200, "round {} commit {}", round, n);
            assert_eq!(response.build_number, Some(n as u16 + 1));
            assert_eq!(lookup(&executor, "1.0", &commit(n)).build_number, Some(n as u16 + 1));
        }
    }
    assert_eq!(numbers(&list(&executor, "1.0")).len(), 5);
}

#[test]
fn series_are_independent() {
    let executor = ephemeral_executor();
    let shared = commit(7);

    let a = allocate(&executor, "1.1", &shared);
    let b = allocate(&executor, "1.2", &shared);
    let c = allocate(&executor, "2.1", &shared);
    for response in [&a, &b, &c] {
        assert_eq!(response.status, 201);
        assert_eq!(response.build_number, Some(1));
        assert_eq!(response.message, "Unknown series. New build number created.");
    }
    assert_ne!(a.series_id, b.series_id);
    assert_ne!(b.series_id, c.series_id);

    allocate(&executor, "1.1", &commit(8));
    assert_eq!(numbers(&list(&executor, "1.1")), vec![1, 2]);
    assert_eq!(numbers(&list(&executor, "1.2")), vec![1]);
}

#[test]
fn series_text_is_normalised() {
    let executor = ephemeral_executor();
    allocate(&executor, "01.02", &commit(1));
    let response = allocate(&executor, "1.2", &commit(1));
    assert_eq!(response.status, 200);
    assert_eq!(response.series.as_deref(), Some("1.2"));
}

#[test]
fn commits_are_case_sensitive() {
    let executor = ephemeral_executor();
    let lower = "abcdef0123456789abcdef0123456789abcdef01";
    let upper = lower.to_uppercase();
    assert_eq!(allocate(&executor, "3.0", lower).build_number, Some(1));
    assert_eq!(allocate(&executor, "3.0", &upper).build_number, Some(2));
}

#[test]
fn allocator_reports_outcomes() {
    let executor = ephemeral_executor();
    let allocator: &Allocator = executor.allocator();
    let key = SeriesKey::new(9, 9);

    let first = allocator.allocate(key, &commit(1)).unwrap();
    assert_eq!(first.outcome, AllocationOutcome::Created);
    assert!(first.series_created);

    let again = allocator.allocate(key, &commit(1)).unwrap();
    assert_eq!(again.outcome, AllocationOutcome::AlreadyKnown);
    assert!(!again.series_created);
    assert_eq!(again.build, first.build);

    let listing = allocator.list_builds(key).unwrap();
    assert_eq!(listing.series, first.series);
    assert_eq!(listing.builds, vec![first.build]);
}
