//! # Password Module
//!
//! Salted PBKDF2-HMAC-SHA256 password hashes.
//!
//! Encoded form: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Iteration count for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// A stored password hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordHash {
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt.
    pub fn derive(password: &str) -> Result<Self> {
        Self::derive_with(password, DEFAULT_ITERATIONS)
    }

    /// Hash with an explicit iteration count. Tests use a low count.
    pub fn derive_with(password: &str, iterations: u32) -> Result<Self> {
        let salt = random_bytes(SALT_LEN)?;
        let hash = compute(password, &salt, iterations);
        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }

    /// Check `password` against this hash in constant time.
    pub fn verify(&self, password: &str) -> bool {
        let candidate = compute(password, &self.salt, self.iterations);
        candidate.ct_eq(&self.hash).into()
    }

    /// Parse the encoded form.
    pub fn parse(encoded: &str) -> Result<Self> {
        let malformed = || Error::Corrupt("malformed password hash".to_string());

        let mut parts = encoded.split('$');
        if parts.next() != Some(SCHEME) {
            return Err(malformed());
        }
        let iterations: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .ok_or_else(malformed)?;
        let salt = parts
            .next()
            .and_then(|s| hex::decode(s).ok())
            .filter(|s| s.len() == SALT_LEN)
            .ok_or_else(malformed)?;
        let hash = parts
            .next()
            .and_then(|s| hex::decode(s).ok())
            .filter(|h| h.len() == HASH_LEN)
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }

    /// Render the encoded form.
    pub fn encode(&self) -> String {
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(&self.salt),
            hex::encode(&self.hash)
        )
    }
}

/// `len` bytes from the operating system's CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes).map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(bytes)
}

fn compute(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out.to_vec()
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl TryFrom<String> for PasswordHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PasswordHash> for String {
    fn from(value: PasswordHash) -> Self {
        value.encode()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_the_right_password() {
        let hash = PasswordHash::derive_with("hunter22", 1_000).unwrap();
        assert!(hash.verify("hunter22"));
        assert!(!hash.verify("hunter23"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = PasswordHash::derive_with("same-password", 1_000).unwrap();
        let b = PasswordHash::derive_with("same-password", 1_000).unwrap();
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn encode_parse_keeps_verification() {
        let hash = PasswordHash::derive_with("secret-pass", 1_000).unwrap();
        let parsed = PasswordHash::parse(&hash.encode()).unwrap();
        assert!(parsed.verify("secret-pass"));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in [
            "",
            "plain",
            "md5$1$00$00",
            "pbkdf2-sha256$0$00$00",
            "pbkdf2-sha256$10$zz$00",
            "pbkdf2-sha256$10$00112233445566778899aabbccddeeff$00",
        ] {
            assert!(PasswordHash::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn salt_is_full_length_os_randomness() {
        let a = PasswordHash::derive_with("same-password", 1_000).unwrap();
        assert_eq!(a.salt.len(), SALT_LEN);
        // A v4 UUID pins the high nibble of byte 6; OS bytes do not.
        let nibbles: std::collections::BTreeSet<u8> = (0..64)
            .map(|_| random_bytes(SALT_LEN).unwrap()[6] >> 4)
            .collect();
        assert!(nibbles.len() > 1);
    }

    #[test]
    fn debug_hides_material() {
        let hash = PasswordHash::derive_with("secret-pass", 1_000).unwrap();
        let debug = format!("{hash:?}");
        assert!(!debug.contains(&hex::encode(&hash.hash)));
    }
}
