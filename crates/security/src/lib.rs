//! Access control for buildseq.
//!
//! Callers present an opaque bearer token. Only SHA-512 digests of accepted
//! tokens are ever configured, so plaintext tokens never reach disk.
//!
//! - [`hash_token`] turns a token into the digest an operator configures
//! - [`CredentialStore`] decides whether a token is permitted
//! - [`DigestCredentials`] is the static, config-backed store
//! - [`Authenticator`] is what request handling calls

#![warn(missing_docs)]

mod authenticator;
mod digest;

pub use authenticator::{Authenticator, CredentialStore};
pub use digest::{hash_token, CredentialError, DigestCredentials, DIGEST_HEX_LEN};
