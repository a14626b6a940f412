// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted memo records and the store contract.

use std::collections::BTreeSet;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{StorageError, StorageResult};
use crate::crypto::{fill_random, KeyDigest, Nonce, Salt};

/// Random bytes behind each memo id (24 URL-safe characters).
pub const MEMO_ID_BYTES: usize = 18;

const MAX_ID_ATTEMPTS: usize = 4;

/// How the key is expected to reach the reader. Client UX hint only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    #[default]
    Qr,
    Direct,
}

/// Which foreign domains may fetch a memo.
///
/// `federation_shared = true` with an empty `trusted_domains` means no
/// domain is trusted yet, not that every domain is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationPolicy {
    pub federation_shared: bool,
    pub trusted_domains: BTreeSet<String>,
}

impl FederationPolicy {
    /// Owner-domain access only.
    pub fn private() -> Self {
        Self::default()
    }

    pub fn shared_with<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            federation_shared: true,
            trusted_domains: domains
                .into_iter()
                .map(|d| d.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn trusts(&self, domain: &str) -> bool {
        self.trusted_domains.contains(&domain.to_ascii_lowercase())
    }
}

/// Descriptive metadata. Not security relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub access_type: AccessType,
}

impl Default for MemoMetadata {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            size_bytes: 0,
            duration_seconds: None,
            access_type: AccessType::Qr,
        }
    }
}

/// Everything written when a memo is created.
#[derive(Debug, Clone)]
pub struct NewMemo {
    pub owner_domain: String,
    pub ciphertext: Vec<u8>,
    pub iv: Nonce,
    pub key_hash: KeyDigest,
    /// Present only for passphrase-protected memos.
    pub kdf_salt: Option<Salt>,
    pub metadata: MemoMetadata,
    pub federation: FederationPolicy,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A persisted memo as returned by [`MemoStore::get_for_read`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoRecord {
    pub id: String,
    pub owner_domain: String,
    pub ciphertext: Vec<u8>,
    pub iv: Nonce,
    pub key_hash: KeyDigest,
    pub kdf_salt: Option<Salt>,
    pub metadata: MemoMetadata,
    pub federation: FederationPolicy,
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl MemoRecord {
    pub fn from_new(id: String, memo: NewMemo) -> Self {
        Self {
            id,
            owner_domain: memo.owner_domain,
            ciphertext: memo.ciphertext,
            iv: memo.iv,
            key_hash: memo.key_hash,
            kdf_salt: memo.kdf_salt,
            metadata: memo.metadata,
            federation: memo.federation,
            expires_at: memo.expires_at,
            access_count: 0,
            created_at: memo.created_at,
            last_accessed_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self, now)
    }
}

/// Expiry is terminal: once `now` passes `expires_at` the memo stays unreadable.
pub fn is_expired(record: &MemoRecord, now: DateTime<Utc>) -> bool {
    record.expires_at.is_some_and(|expires_at| now > expires_at)
}

/// Persistence for encrypted memos.
///
/// There is no update method: after `create`, the only
/// mutation is the access counter bump in `record_access`.
pub trait MemoStore: Send + Sync {
    /// Allocate a fresh id and write the full record exactly once.
    fn create(&self, memo: NewMemo) -> StorageResult<String>;

    /// Plain lookup. No expiry check and no side effects.
    fn get_for_read(&self, memo_id: &str) -> StorageResult<MemoRecord>;

    /// Increment `access_count` and stamp `last_accessed_at`.
    ///
    /// Call only after a successful decrypt. Returns the new count.
    fn record_access(&self, memo_id: &str, at: DateTime<Utc>) -> StorageResult<u64>;

    /// Cheap liveness probe for readiness checks.
    fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Generate a random URL-safe memo id.
pub fn new_memo_id() -> StorageResult<String> {
    let mut bytes = [0u8; MEMO_ID_BYTES];
    fill_random(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Draw ids until `taken` reports a free one.
pub(crate) fn allocate_memo_id(
    mut taken: impl FnMut(&str) -> StorageResult<bool>,
) -> StorageResult<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = new_memo_id()?;
        if !taken(&id)? {
            return Ok(id);
        }
    }
    Err(StorageError::IdCollision(MAX_ID_ATTEMPTS))
}
