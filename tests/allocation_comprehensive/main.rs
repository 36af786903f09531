//! Allocation Comprehensive Test Suite
//!
//! End-to-end tests through the public `buildseq` facade.
//!
//! ## Test Tiers
//!
//! - **Tier 1**: Numbering invariants (dense, stable, per-series)
//! - **Tier 2**: Durability and crash recovery
//! - **Tier 3**: Concurrent allocation
//! - **Tier 4**: Request contract (status codes and messages)
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test allocation_comprehensive
//! ```

mod test_utils;

mod tier1_numbering_invariants;
mod tier2_durability;
mod tier3_concurrency;
mod tier4_request_contract;
