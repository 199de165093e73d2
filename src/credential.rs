//! Credential derivation and verification
//!
//! The record store treats credential material as opaque: a per-user random
//! salt plus a keyed blake3 hash of the password under a system-wide pepper.
//! Verification recomputes the hash and compares in constant time.
//!
//! The pepper is loaded from the environment (base64, minimum 32 bytes
//! decoded) so snapshots only ever contain salted hashes, never anything
//! recoverable without the deployment's pepper.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Per-user salt length in bytes
pub const SALT_LEN: usize = 16;

/// Credential hash length in bytes (blake3 output)
pub const HASH_LEN: usize = 32;

/// Opaque credential material stored per user
///
/// Serialized into the users snapshot resource as two lowercase fixed-width
/// hex fields (32 and 64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Per-user random salt
    pub salt: [u8; SALT_LEN],

    /// Keyed hash of salt + password
    pub hash: [u8; HASH_LEN],
}

impl Credential {
    /// Lowercase hex encoding of the salt (always 32 characters)
    pub fn salt_hex(&self) -> String {
        hex::encode(self.salt)
    }

    /// Lowercase hex encoding of the hash (always 64 characters)
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Decode from the fixed-width hex fields of a users snapshot row
    ///
    /// Returns `None` on any length or encoding mismatch so the snapshot
    /// loader can skip the row.
    pub fn from_hex(salt_hex: &str, hash_hex: &str) -> Option<Self> {
        if salt_hex.len() != SALT_LEN * 2 || hash_hex.len() != HASH_LEN * 2 {
            return None;
        }
        let mut salt = [0u8; SALT_LEN];
        let mut hash = [0u8; HASH_LEN];
        hex::decode_to_slice(salt_hex, &mut salt).ok()?;
        hex::decode_to_slice(hash_hex, &mut hash).ok()?;
        Some(Self { salt, hash })
    }
}

/// Derives and verifies credentials under a system-wide pepper
#[derive(Clone)]
pub struct CredentialManager {
    pepper: [u8; 32],
}

impl CredentialManager {
    /// Create from environment variables
    ///
    /// Requires `BALLOT_CREDENTIAL_PEPPER` (base64 encoded, minimum 32 bytes
    /// when decoded). Only the first 32 bytes are used as the hash key.
    pub fn from_env() -> Result<Self> {
        let pepper = std::env::var("BALLOT_CREDENTIAL_PEPPER").map_err(|_| {
            Error::config("BALLOT_CREDENTIAL_PEPPER environment variable required")
        })?;
        Self::from_base64(&pepper)
    }

    /// Create from a base64-encoded pepper (minimum 32 bytes decoded)
    pub fn from_base64(pepper_b64: &str) -> Result<Self> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(pepper_b64)
            .map_err(|_| Error::config("credential pepper must be valid base64"))?;

        if decoded.len() < 32 {
            return Err(Error::config(
                "credential pepper must be at least 32 bytes when decoded",
            ));
        }

        let mut pepper = [0u8; 32];
        pepper.copy_from_slice(&decoded[..32]);
        Ok(Self { pepper })
    }

    /// Create for testing with a random pepper
    pub fn for_testing() -> Self {
        let mut pepper = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut pepper);
        Self { pepper }
    }

    /// Derive fresh credential material for a password
    ///
    /// Generates a random per-user salt and hashes salt + password under the
    /// pepper key.
    pub fn derive(&self, password: &str) -> Credential {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        Credential {
            hash: self.hash_with_salt(&salt, password),
            salt,
        }
    }

    /// Verify a password attempt against stored credential material
    ///
    /// Constant-time comparison of the recomputed hash.
    pub fn verify(&self, credential: &Credential, attempt: &str) -> bool {
        let computed = self.hash_with_salt(&credential.salt, attempt);
        constant_time_eq(&computed, &credential.hash)
    }

    fn hash_with_salt(&self, salt: &[u8; SALT_LEN], password: &str) -> [u8; HASH_LEN] {
        let mut hasher = blake3::Hasher::new_keyed(&self.pepper);
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

/// Compare two byte slices in constant time
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
