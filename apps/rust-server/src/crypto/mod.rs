// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Memo Encryption
//!
//! Authenticated encryption for memo payloads using AES-256-GCM (`ring`).
//!
//! ## Sizes
//!
//! | Item | Bytes |
//! |------|-------|
//! | Key  | 32    |
//! | IV   | 12    |
//! | Tag  | 16 (appended to the ciphertext) |
//! | Salt | 16 (passphrase flow only) |
//!
//! ## Security Notes
//!
//! - Every memo gets its own random key, so IV reuse under one key cannot
//!   happen across memos. The IV is still drawn fresh on every `encrypt`.
//! - `decrypt` has exactly one failure mode. A wrong key, a wrong IV and a
//!   corrupted ciphertext are indistinguishable to the caller.
//! - Keys are only derived from low-entropy input through
//!   [`derive_key_from_passphrase`].
//! - Nothing in this module logs or persists key material.

pub mod verifier;

use std::fmt;
use std::num::NonZeroU32;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::aead::{self, Aad, LessSafeKey, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use verifier::{hash_key, verify, KeyDigest};

/// Raw key length (AES-256).
pub const KEY_LEN: usize = 32;

/// GCM nonce length.
pub const NONCE_LEN: usize = aead::NONCE_LEN;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// PBKDF2 salt length.
pub const SALT_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 work factor.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const PBKDF2_ROUNDS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(rounds) => rounds,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

/// Errors raised while producing key material or ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("secure random source unavailable")]
    RandomUnavailable,

    #[error("encryption failed")]
    EncryptionFailed,
}

/// The only way decryption can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    #[error("authentication failed")]
    AuthenticationFailed,
}

// =============================================================================
// Key material
// =============================================================================

/// A 256-bit memo key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice, returning `None` unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Raw key bytes. Never log or store these.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// URL-safe, unpadded base64 form used in capability tokens and request bodies.
    pub fn to_base64url(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.0)
    }

    /// Parse the URL-safe base64 form. Trailing `=` padding is tolerated.
    pub fn from_base64url(encoded: &str) -> Option<Self> {
        let mut bytes = Base64UrlUnpadded::decode_vec(encoded.trim_end_matches('=')).ok()?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&"[REDACTED]").finish()
    }
}

/// A 96-bit GCM nonce, stored alongside its ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.0)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.to_base64url()
    }
}

impl TryFrom<String> for Nonce {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_fixed::<NONCE_LEN>(&value)
            .map(Self)
            .ok_or_else(|| format!("nonce must be {NONCE_LEN} base64url bytes"))
    }
}

/// PBKDF2 salt. Not secret; persisted with passphrase-protected memos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        Base64UrlUnpadded::encode_string(&salt.0)
    }
}

impl TryFrom<String> for Salt {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_fixed::<SALT_LEN>(&value)
            .map(Self)
            .ok_or_else(|| format!("salt must be {SALT_LEN} base64url bytes"))
    }
}

fn decode_fixed<const N: usize>(encoded: &str) -> Option<[u8; N]> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded).ok()?;
    bytes.as_slice().try_into().ok()
}

// =============================================================================
// Randomness
// =============================================================================

/// Fill `dest` from the operating system CSPRNG.
pub fn fill_random(dest: &mut [u8]) -> Result<(), CryptoError> {
    SystemRandom::new()
        .fill(dest)
        .map_err(|_| CryptoError::RandomUnavailable)
}

/// Generate a fresh random memo key.
pub fn generate_key() -> Result<Key, CryptoError> {
    let mut bytes = [0u8; KEY_LEN];
    fill_random(&mut bytes)?;
    let key = Key::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Generate a fresh random IV.
pub fn generate_iv() -> Result<Nonce, CryptoError> {
    let mut bytes = [0u8; NONCE_LEN];
    fill_random(&mut bytes)?;
    Ok(Nonce(bytes))
}

fn generate_salt() -> Result<Salt, CryptoError> {
    let mut bytes = [0u8; SALT_LEN];
    fill_random(&mut bytes)?;
    Ok(Salt(bytes))
}

// =============================================================================
// AES-256-GCM
// =============================================================================

fn aead_key(key: &Key) -> Option<LessSafeKey> {
    UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .ok()
        .map(LessSafeKey::new)
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
///
/// Returns the ciphertext with the 16-byte tag appended, and the IV.
pub fn encrypt(plaintext: &[u8], key: &Key) -> Result<(Vec<u8>, Nonce), CryptoError> {
    let iv = generate_iv()?;
    let sealing_key = aead_key(key).ok_or(CryptoError::EncryptionFailed)?;

    let mut in_out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    in_out.extend_from_slice(plaintext);
    sealing_key
        .seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(iv.0),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok((in_out, iv))
}

/// Decrypt and authenticate `ciphertext` (tag included).
pub fn decrypt(ciphertext: &[u8], key: &Key, iv: &Nonce) -> Result<Vec<u8>, DecryptError> {
    let opening_key = aead_key(key).ok_or(DecryptError::AuthenticationFailed)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext_len = opening_key
        .open_in_place(
            aead::Nonce::assume_unique_for_key(iv.0),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| DecryptError::AuthenticationFailed)?
        .len();
    in_out.truncate(plaintext_len);

    Ok(in_out)
}

// =============================================================================
// Passphrase derivation
// =============================================================================

/// Derive a key from a human passphrase with PBKDF2-HMAC-SHA256.
///
/// A new 16-byte salt is generated when `salt` is `None`. The salt must be
/// kept with the memo; the same passphrase and salt always give the same key.
pub fn derive_key_from_passphrase(
    passphrase: &str,
    salt: Option<&Salt>,
) -> Result<(Key, Salt), CryptoError> {
    let salt = match salt {
        Some(salt) => *salt,
        None => generate_salt()?,
    };

    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ROUNDS,
        salt.as_bytes(),
        passphrase.as_bytes(),
        &mut out,
    );
    let key = Key::from_bytes(out);
    out.zeroize();

    Ok((key, salt))
}
