//! Token digests and the static digest set.

use sha2::{Digest, Sha512};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

/// Length of a hex-encoded SHA-512 digest.
pub const DIGEST_HEX_LEN: usize = 128;

const DIGEST_LEN: usize = 64;

/// A configured digest could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Digest text has the wrong length
    #[error("digest #{index} has {len} characters, expected 128")]
    WrongLength {
        /// Position in the configured list
        index: usize,
        /// Actual length
        len: usize,
    },
    /// Digest text is not hexadecimal
    #[error("digest #{index} is not valid hex: {reason}")]
    NotHex {
        /// Position in the configured list
        index: usize,
        /// Decoder message
        reason: String,
    },
}

/// Hex-encoded SHA-512 digest of `token`, as placed in `authorized_digests`.
pub fn hash_token(token: &str) -> String {
    hex::encode(digest(token))
}

fn digest(token: &str) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Sha512::digest(token.as_bytes()));
    out
}

/// A fixed set of permitted token digests.
#[derive(Clone, Default)]
pub struct DigestCredentials {
    digests: Vec<[u8; DIGEST_LEN]>,
}

impl DigestCredentials {
    /// Parse hex digests (either case).
    ///
    /// # Errors
    ///
    /// The first entry that is not 128 hex characters.
    pub fn from_hex<I, S>(digests: I) -> Result<Self, CredentialError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = digests
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_ref();
                if text.len() != DIGEST_HEX_LEN {
                    return Err(CredentialError::WrongLength {
                        index,
                        len: text.len(),
                    });
                }
                let mut bytes = [0u8; DIGEST_LEN];
                hex::decode_to_slice(text, &mut bytes).map_err(|e| CredentialError::NotHex {
                    index,
                    reason: e.to_string(),
                })?;
                Ok(bytes)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { digests })
    }

    /// Build a set directly from plaintext tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: tokens.into_iter().map(|t| digest(t.as_ref())).collect(),
        }
    }

    /// Number of configured digests.
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// True if no token can be permitted.
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// True iff `token` is non-empty and its digest is in the set.
    ///
    /// Every candidate is compared in constant time, with no early exit, and
    /// the empty token takes the same path.
    pub fn contains(&self, token: &str) -> bool {
        let presented = digest(token);
        let mut found = Choice::from(0);
        for candidate in &self.digests {
            found |= candidate[..].ct_eq(&presented[..]);
        }
        bool::from(found) && !token.is_empty()
    }
}

impl std::fmt::Debug for DigestCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestCredentials")
            .field("digests", &self.digests.len())
            .finish()
    }
}
