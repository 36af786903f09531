//! Request authentication.

use crate::digest::DigestCredentials;
use std::sync::Arc;
use tracing::debug;

/// Source of truth for which tokens may call the API.
pub trait CredentialStore: Send + Sync {
    /// True iff `token` is accepted.
    fn is_permitted(&self, token: &str) -> bool;
}

impl CredentialStore for DigestCredentials {
    fn is_permitted(&self, token: &str) -> bool {
        self.contains(token)
    }
}

/// Checks presented tokens against a [`CredentialStore`].
///
/// No side effects beyond a debug log line on rejection.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
}

impl Authenticator {
    /// Authenticate against `store`.
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Authenticate against a fixed digest set.
    pub fn from_digests(credentials: DigestCredentials) -> Self {
        Self::new(credentials)
    }

    /// True iff a token was presented and is permitted.
    ///
    /// A missing token is checked as the empty token so it costs the same
    /// as a wrong one.
    pub fn authorize(&self, token: Option<&str>) -> bool {
        let permitted = self.store.is_permitted(token.unwrap_or(""));
        if !permitted {
            debug!(target: "buildseq::auth", presented = token.is_some(), "Token rejected");
        }
        permitted
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
