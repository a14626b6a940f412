// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key possession checks without key custody.
//!
//! The store keeps `SHA-256(key)` and nothing else. A presented key is
//! accepted when its digest matches, compared in constant time.

use std::fmt;

use ring::digest::{digest, SHA256, SHA256_OUTPUT_LEN};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::Key;

/// SHA-256 digest of a raw memo key. Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyDigest([u8; SHA256_OUTPUT_LEN]);

impl KeyDigest {
    pub fn as_bytes(&self) -> &[u8; SHA256_OUTPUT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Option<Self> {
        let mut out = [0u8; SHA256_OUTPUT_LEN];
        hex::decode_to_slice(encoded, &mut out).ok()?;
        Some(Self(out))
    }
}

impl fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyDigest({})", self.to_hex())
    }
}

impl From<KeyDigest> for String {
    fn from(d: KeyDigest) -> Self {
        d.to_hex()
    }
}

impl TryFrom<String> for KeyDigest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| "key digest must be 64 hex characters".to_string())
    }
}

/// Hash the raw 32 key bytes for storage.
pub fn hash_key(key: &Key) -> KeyDigest {
    let d = digest(&SHA256, key.as_bytes());
    let mut out = [0u8; SHA256_OUTPUT_LEN];
    out.copy_from_slice(d.as_ref());
    KeyDigest(out)
}

/// Check a presented key against a stored digest.
///
/// Pure; auditing the outcome is the caller's job.
pub fn verify(key: &Key, stored: &KeyDigest) -> bool {
    hash_key(key)
        .as_bytes()
        .as_slice()
        .ct_eq(stored.as_bytes().as_slice())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_key, KEY_LEN};

    #[test]
    fn correct_key_verifies() {
        for _ in 0..16 {
            let key = generate_key().unwrap();
            assert!(verify(&key, &hash_key(&key)));
        }
    }

    #[test]
    fn other_keys_do_not_verify() {
        let k1 = generate_key().unwrap();
        let k2 = generate_key().unwrap();
        assert!(!verify(&k1, &hash_key(&k2)));

        let mut near = *k1.as_bytes();
        near[KEY_LEN - 1] ^= 0x01;
        assert!(!verify(&Key::from_bytes(near), &hash_key(&k1)));
    }

    #[test]
    fn known_answer() {
        // SHA-256 of 32 zero bytes.
        let digest = hash_key(&Key::from_bytes([0u8; KEY_LEN]));
        assert_eq!(
            digest.to_hex(),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn digest_hex_round_trip() {
        let digest = hash_key(&generate_key().unwrap());
        assert_eq!(KeyDigest::from_hex(&digest.to_hex()), Some(digest));

        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json.len(), 66);
        let back: KeyDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);

        assert!(KeyDigest::from_hex("abcd").is_none());
        assert!(KeyDigest::from_hex(&"zz".repeat(32)).is_none());
        assert!(KeyDigest::from_hex(&"ab".repeat(33)).is_none());
    }
}
