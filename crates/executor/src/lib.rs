//! # buildseq Executor
//!
//! The request-level API of buildseq. A transport (HTTP handler, CLI, test)
//! builds a [`Request`], hands it to an [`Executor`] and gets a [`Response`]
//! back. The executor never fails: every error becomes a response with a
//! status code and a message.
//!
//! ## Pipeline
//!
//! ```text
//! Request ─▶ authenticate ─▶ route ─▶ validate ─▶ Allocator ─▶ Response
//!             401             404/405  400         201/200/409/422/404/500
//! ```
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Command |
//! |----------|--------|---------|
//! | `/<series>/<commit>` | POST | [`Command::Allocate`] |
//! | `/<series>/<commit>` | GET | [`Command::Lookup`] |
//! | `/<series>` | GET | [`Command::ListBuilds`] |
//!
//! ```text
//! let executor = Executor::new(Database::open("/var/lib/buildseq")?)?;
//! let response = executor.execute(
//!     &Request::new(Method::Post)
//!         .with_series("1.4")
//!         .with_commit("931ad6480dce38486a221119bccd0a35e5cdbb81")
//!         .with_token(token),
//! );
//! assert_eq!(response.status, 201);
//! ```

#![warn(missing_docs)]

mod command;
mod convert;
mod error;
mod executor;
mod response;
mod validate;

#[cfg(test)]
mod tests;

pub use command::{Command, Method, Request};
pub use error::{Error, Result};
pub use executor::Executor;
pub use response::{BuildEntry, Response};
pub use validate::{parse_series, validate_commit, CommitPolicy};
