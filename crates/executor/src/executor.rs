//! The Executor - single entry point for requests.
//!
//! Stateless apart from its configuration: the allocator, the
//! authenticator and the commit policy. All data lives in the engine.

use std::sync::Arc;

use buildseq_core::Error as CoreError;
use buildseq_engine::{Allocator, Database};
use buildseq_security::{Authenticator, DigestCredentials};
use tracing::{debug, error};

use crate::validate::{parse_series, validate_commit, CommitPolicy};
use crate::{Command, Error, Request, Response, Result};

/// Turns requests into responses.
///
/// `Send + Sync`, cheap to clone; share one per database.
#[derive(Clone)]
pub struct Executor {
    allocator: Allocator,
    authenticator: Authenticator,
    policy: CommitPolicy,
}

impl Executor {
    /// Executor over `db`, configured from its `buildseq.toml`
    ///
    /// Tokens are checked against `authorized_digests`; commits against
    /// `min_commit_length`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if a configured digest is malformed.
    pub fn new(db: Arc<Database>) -> buildseq_core::Result<Self> {
        let credentials = DigestCredentials::from_hex(&db.config().authorized_digests)
            .map_err(|e| CoreError::invalid_input(format!("authorized_digests: {}", e)))?;
        Ok(Self::with_authenticator(
            db,
            Authenticator::from_digests(credentials),
        ))
    }

    /// Executor over `db` with a caller-supplied authenticator
    pub fn with_authenticator(db: Arc<Database>, authenticator: Authenticator) -> Self {
        let policy = CommitPolicy::with_min_length(db.config().min_commit_length);
        Self {
            allocator: Allocator::new(db),
            authenticator,
            policy,
        }
    }

    /// Replace the commit policy
    pub fn with_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The allocator requests run against
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// The commit policy in force
    pub fn policy(&self) -> &CommitPolicy {
        &self.policy
    }

    /// Authenticate, route and run a request.
    pub fn execute(&self, request: &Request) -> Response {
        if !self.authenticator.authorize(request.token.as_deref()) {
            return Response::from_error(&Error::Unauthorized);
        }
        match Command::route(request) {
            Ok(command) => self.dispatch(&command),
            // The commit endpoint checks its parameters before the method
            Err(e @ Error::InvalidMethod { .. }) => match self.check_parameters(request) {
                Ok(()) => self.fail(e),
                Err(invalid) => self.fail(invalid),
            },
            Err(e) => self.fail(e),
        }
    }

    fn check_parameters(&self, request: &Request) -> Result<()> {
        if let (Some(series), Some(commit)) = (&request.series, &request.commit) {
            parse_series(series)?;
            validate_commit(commit, &self.policy)?;
        }
        Ok(())
    }

    /// Authenticate and run an already-routed command.
    pub fn execute_command(&self, token: Option<&str>, command: &Command) -> Response {
        if !self.authenticator.authorize(token) {
            return Response::from_error(&Error::Unauthorized);
        }
        self.dispatch(command)
    }

    fn dispatch(&self, command: &Command) -> Response {
        match self.run(command) {
            Ok(response) => {
                debug!(target: "buildseq::executor", command = command.name(), status = response.status, "Request served");
                response
            }
            Err(e) => self.fail(e),
        }
    }

    fn run(&self, command: &Command) -> Result<Response> {
        match command {
            Command::Allocate { series, commit } => {
                let key = parse_series(series)?;
                validate_commit(commit, &self.policy)?;
                let allocation = self.allocator.allocate(key, commit)?;
                Ok(Response::allocated(&allocation))
            }
            Command::Lookup { series, commit } => {
                let key = parse_series(series)?;
                validate_commit(commit, &self.policy)?;
                let allocation = self.allocator.lookup(key, commit)?;
                Ok(Response::found(&allocation))
            }
            Command::ListBuilds { series } => {
                let key = parse_series(series)?;
                let listing = self.allocator.list_builds(key)?;
                Ok(Response::listing(&listing))
            }
        }
    }

    fn fail(&self, e: Error) -> Response {
        match &e {
            Error::Internal { reason } => {
                error!(target: "buildseq::executor", %reason, "Request failed")
            }
            other => debug!(target: "buildseq::executor", status = other.status(), error = ?other, "Request rejected"),
        }
        Response::from_error(&e)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
