//! buildseq - concurrency-safe build number allocator
//!
//! buildseq assigns a gapless, strictly increasing build number to every
//! distinct commit requested within a release series (`<major>.<minor>`).
//! Requests for the same commit always return the same number, and
//! concurrent requests never produce duplicates.
//!
//! # Quick Start
//!
//! ```ignore
//! use buildseq::{hash_token, BuildSeqConfig, Database, Executor, Method, Request};
//!
//! let config = BuildSeqConfig {
//!     authorized_digests: vec![hash_token("ci-token")],
//!     ..Default::default()
//! };
//! let db = Database::ephemeral_with_config(config)?;
//! let executor = Executor::new(db)?;
//!
//! let response = executor.execute(
//!     &Request::new(Method::Post)
//!         .with_series("1.4")
//!         .with_commit("931ad6480dce38486a221119bccd0a35e5cdbb81")
//!         .with_token("ci-token"),
//! );
//! assert_eq!(response.build_number, Some(1));
//! ```
//!
//! # Architecture
//!
//! Requests go through the [`Executor`], which authenticates, routes and
//! validates them before calling the [`Allocator`]. The allocator runs
//! optimistic transactions on the [`Database`]; committed transactions are
//! logged to a write-ahead log and replayed on open.

pub use buildseq_executor::*;

pub use buildseq_core::{BuildNumber, BuildRecord, SeriesKey, SeriesRecord};
pub use buildseq_durability::{DurabilityMode, ReplayStats, WalTail};
pub use buildseq_engine::{
    Allocation, AllocationOutcome, Allocator, BuildSeqConfig, Database, RetryConfig,
    SeriesListing, CONFIG_FILE_NAME,
};
pub use buildseq_security::{hash_token, Authenticator, CredentialStore, DigestCredentials};
