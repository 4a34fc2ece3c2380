use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ChainError;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 output.
pub type Digest = [u8; 32];

/// All-zero digest, the parent of the first receipt in a chain.
pub const ZERO_DIGEST: Digest = [0u8; 32];

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// SHA-256 over several inputs, as if concatenated.
pub fn sha256_many(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// HMAC-SHA256 tag.
pub fn hmac_sha256(key: &ChainKey, data: &[u8]) -> Result<Digest, ChainError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ChainError::Mac(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time digest comparison.
pub fn digest_eq(a: &Digest, b: &Digest) -> subtle::Choice {
    a.ct_eq(b)
}

/// Per-stream HMAC key. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey(Vec<u8>);

impl ChainKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Fresh 32-byte key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainKey(<{} bytes redacted>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_many_matches_concat() {
        assert_eq!(sha256_many(&[b"ab".as_slice(), b"c"]), sha256(b"abc"));
    }

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let key = ChainKey::from_bytes(b"Jefe");
        let tag = hmac_sha256(&key, b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_digest_eq() {
        let a = sha256(b"x");
        let mut b = a;
        assert!(bool::from(digest_eq(&a, &b)));
        b[31] ^= 1;
        assert!(!bool::from(digest_eq(&a, &b)));
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = ChainKey::generate();
        assert_eq!(key.as_bytes().len(), 32);
        assert!(!format!("{key:?}").contains(&hex::encode(key.as_bytes())));
    }
}
