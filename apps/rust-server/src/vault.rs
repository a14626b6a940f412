// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Memo Vault
//!
//! Orchestrates the memo lifecycle on top of the crypto, capability,
//! storage and federation modules.
//!
//! ## Read path
//!
//! ```text
//! lookup → expiry → federation gate → key digest → decrypt → record_access → audit
//! ```
//!
//! Every attempt that reaches a decision writes exactly one audit entry,
//! after the outcome is known. Storage failures are not decisions: they
//! propagate without an entry.
//!
//! All operations are synchronous and run to completion once started. A
//! dropped request future cannot split a decrypt from its counter bump.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::capability::{self, CapabilityToken, TokenError};
use crate::clock::{Clock, SystemClock};
use crate::crypto::{
    decrypt, derive_key_from_passphrase, encrypt, generate_key, hash_key, verify, CryptoError,
    Key, Nonce, Salt,
};
use crate::federation::{FederationDenial, FederationGate};
use crate::storage::{
    AccessAuditor, AccessLogEntry, AccessOperation, AccessType, DenialReason, FederationPolicy,
    MemoMetadata, MemoRecord, MemoStore, NewMemo, StorageError,
};

/// Shortest passphrase accepted for passphrase-protected memos.
pub const MIN_PASSPHRASE_LEN: usize = 8;

// =============================================================================
// Errors
// =============================================================================

/// Why a memo could not be created.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a refused or failed access.
///
/// The variant is precise; the HTTP layer collapses every denial into one
/// generic response.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("memo not found")]
    NotFound,

    #[error("memo expired")]
    Expired,

    #[error("federation denied: {0}")]
    FederationDenied(FederationDenial),

    #[error("presented key does not match")]
    KeyMismatch,

    #[error("ciphertext failed authentication")]
    DecryptFailed,

    #[error("malformed capability token: {0}")]
    TokenMalformed(TokenError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(StorageError),
}

impl AccessError {
    /// The audit reason, or `None` for infrastructure failures.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AccessError::NotFound => Some(DenialReason::NotFound),
            AccessError::Expired => Some(DenialReason::Expired),
            AccessError::FederationDenied(denial) => Some((*denial).into()),
            AccessError::KeyMismatch => Some(DenialReason::KeyMismatch),
            AccessError::DecryptFailed => Some(DenialReason::DecryptFailed),
            AccessError::TokenMalformed(_) => Some(DenialReason::TokenMalformed),
            AccessError::Crypto(_) | AccessError::Storage(_) => None,
        }
    }
}

impl From<StorageError> for AccessError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => AccessError::NotFound,
            other => AccessError::Storage(other),
        }
    }
}

impl From<FederationDenial> for AccessError {
    fn from(denial: FederationDenial) -> Self {
        AccessError::FederationDenied(denial)
    }
}

// =============================================================================
// Inputs and outputs
// =============================================================================

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub domain: String,
    pub identity: String,
}

impl Requester {
    pub fn new(domain: impl AsRef<str>, identity: impl Into<String>) -> Self {
        Self {
            domain: domain.as_ref().to_ascii_lowercase(),
            identity: identity.into(),
        }
    }
}

/// Parameters for a new memo.
#[derive(Debug, Clone, Default)]
pub struct CreateMemo {
    pub owner_domain: String,
    pub plaintext: Vec<u8>,
    pub content_type: Option<String>,
    pub duration_seconds: Option<f64>,
    pub access_type: AccessType,
    pub expires_at: Option<DateTime<Utc>>,
    pub federation: FederationPolicy,
}

/// A freshly created memo. The token is the only copy of the key.
#[derive(Debug)]
pub struct CreatedMemo {
    pub memo_id: String,
    pub token: CapabilityToken,
}

/// Decrypted memo content for the owner domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    pub memo_id: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub access_count: u64,
}

/// What a trusted peer receives: ciphertext it decrypts itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedPayload {
    pub memo_id: String,
    pub owner_domain: String,
    pub ciphertext: Vec<u8>,
    pub iv: Nonce,
    pub content_type: String,
    pub duration_seconds: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// MemoVault
// =============================================================================

pub struct MemoVault {
    store: Arc<dyn MemoStore>,
    auditor: Arc<dyn AccessAuditor>,
    gate: FederationGate,
    clock: Arc<dyn Clock>,
}

impl MemoVault {
    pub fn new(
        store: Arc<dyn MemoStore>,
        auditor: Arc<dyn AccessAuditor>,
        gate: FederationGate,
    ) -> Self {
        Self::with_clock(store, auditor, gate, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn MemoStore>,
        auditor: Arc<dyn AccessAuditor>,
        gate: FederationGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            auditor,
            gate,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn MemoStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Encrypt under a fresh random key and store. Returns the capability token.
    pub fn create(&self, request: CreateMemo) -> Result<CreatedMemo, CreateError> {
        let owner_domain = request.owner_domain.to_ascii_lowercase();
        let key = generate_key()?;
        let memo_id = self.seal_and_store(request, &key, None)?;
        let token = CapabilityToken::new(owner_domain, memo_id.clone(), key);
        Ok(CreatedMemo { memo_id, token })
    }

    /// Encrypt under a key derived from `passphrase`. Only the salt is stored.
    pub fn create_with_passphrase(
        &self,
        request: CreateMemo,
        passphrase: &str,
    ) -> Result<String, CreateError> {
        if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(CreateError::InvalidRequest(format!(
                "passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
            )));
        }
        let (key, salt) = derive_key_from_passphrase(passphrase, None)?;
        self.seal_and_store(request, &key, Some(salt))
    }

    fn seal_and_store(
        &self,
        request: CreateMemo,
        key: &Key,
        kdf_salt: Option<Salt>,
    ) -> Result<String, CreateError> {
        let now = self.clock.now();
        validate_create(&request, now)?;

        let (ciphertext, iv) = encrypt(&request.plaintext, key)?;
        let owner_domain = request.owner_domain.to_ascii_lowercase();
        let federation_shared = request.federation.federation_shared;

        let memo = NewMemo {
            owner_domain: owner_domain.clone(),
            ciphertext,
            iv,
            key_hash: hash_key(key),
            kdf_salt,
            metadata: MemoMetadata {
                content_type: request
                    .content_type
                    .unwrap_or_else(|| MemoMetadata::default().content_type),
                size_bytes: request.plaintext.len() as u64,
                duration_seconds: request.duration_seconds,
                access_type: request.access_type,
            },
            federation: request.federation,
            expires_at: request.expires_at,
            created_at: now,
        };

        let memo_id = self.store.create(memo)?;
        info!(
            memo_id = %memo_id,
            owner_domain = %owner_domain,
            size_bytes = request.plaintext.len(),
            federation_shared,
            passphrase = kdf_salt.is_some(),
            "Memo created"
        );
        Ok(memo_id)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Decrypt a memo for its owner domain.
    pub fn read_local(
        &self,
        memo_id: &str,
        key: &Key,
        requester: &Requester,
    ) -> Result<Plaintext, AccessError> {
        self.read_with(AccessOperation::LocalRead, memo_id, requester, |_| {
            Ok(key.clone())
        })
    }

    /// Decrypt a passphrase-protected memo.
    pub fn unlock_with_passphrase(
        &self,
        memo_id: &str,
        passphrase: &str,
        requester: &Requester,
    ) -> Result<Plaintext, AccessError> {
        self.read_with(AccessOperation::PassphraseUnlock, memo_id, requester, |record| {
            let salt = record.kdf_salt.as_ref().ok_or(AccessError::KeyMismatch)?;
            let (key, _) = derive_key_from_passphrase(passphrase, Some(salt))?;
            Ok(key)
        })
    }

    /// Decode a capability token and read the memo it points at.
    pub fn redeem_token(&self, token: &str, requester: &Requester) -> Result<Plaintext, AccessError> {
        let capability = match capability::decode(token) {
            Ok(capability) => capability,
            Err(e) => {
                let mut entry = AccessLogEntry::new(AccessOperation::TokenRedeem, self.clock.now())
                    .with_requester(&requester.domain, &requester.identity);
                if let Some(memo_id) = capability::memo_id_hint(token) {
                    entry = entry.with_memo(memo_id);
                }
                return self.finish(entry, Err(AccessError::TokenMalformed(e)));
            }
        };

        self.read_with(
            AccessOperation::TokenRedeem,
            &capability.memo_id,
            requester,
            |record| {
                if !capability.domain.eq_ignore_ascii_case(&record.owner_domain) {
                    return Err(FederationDenial::CrossDomainRead.into());
                }
                Ok(capability.key.clone())
            },
        )
    }

    fn read_with(
        &self,
        operation: AccessOperation,
        memo_id: &str,
        requester: &Requester,
        key_for: impl FnOnce(&MemoRecord) -> Result<Key, AccessError>,
    ) -> Result<Plaintext, AccessError> {
        let now = self.clock.now();
        let entry = AccessLogEntry::new(operation, now)
            .with_memo(memo_id)
            .with_requester(&requester.domain, &requester.identity);

        let outcome = self.try_read(memo_id, requester, now, key_for);
        self.finish(entry, outcome)
    }

    fn try_read(
        &self,
        memo_id: &str,
        requester: &Requester,
        now: DateTime<Utc>,
        key_for: impl FnOnce(&MemoRecord) -> Result<Key, AccessError>,
    ) -> Result<Plaintext, AccessError> {
        let record = self.readable(memo_id, now)?;

        self.gate.authorize(&record, &requester.domain)?;
        if !requester.domain.eq_ignore_ascii_case(&record.owner_domain) {
            return Err(FederationDenial::CrossDomainRead.into());
        }

        let key = key_for(&record)?;
        let bytes = open(&record, &key)?;
        let access_count = self.store.record_access(&record.id, now)?;

        Ok(Plaintext {
            memo_id: record.id,
            bytes,
            content_type: record.metadata.content_type,
            access_count,
        })
    }

    /// Release ciphertext to a trusted foreign domain.
    ///
    /// The key is proven here (digest and authentication tag) but the
    /// plaintext never leaves this function.
    pub fn fetch_federated(
        &self,
        memo_id: &str,
        key: &Key,
        requester: &Requester,
        signature: Option<&str>,
    ) -> Result<FederatedPayload, AccessError> {
        let now = self.clock.now();
        let entry = AccessLogEntry::new(AccessOperation::FederatedFetch, now)
            .with_memo(memo_id)
            .with_requester(&requester.domain, &requester.identity);

        let outcome = (|| -> Result<FederatedPayload, AccessError> {
            self.gate
                .authenticate_peer(&requester.domain, memo_id, signature)?;
            let record = self.readable(memo_id, now)?;
            self.gate.authorize(&record, &requester.domain)?;

            let mut plaintext = open(&record, key)?;
            plaintext.zeroize();
            self.store.record_access(&record.id, now)?;

            Ok(FederatedPayload {
                memo_id: record.id,
                owner_domain: record.owner_domain,
                ciphertext: record.ciphertext,
                iv: record.iv,
                content_type: record.metadata.content_type,
                duration_seconds: record.metadata.duration_seconds,
                expires_at: record.expires_at,
            })
        })();

        self.finish(entry, outcome)
    }

    /// Check whether `key` still opens `memo_id`, without counting as a use.
    pub fn verify_key(
        &self,
        memo_id: &str,
        key: &Key,
        requester: &Requester,
    ) -> Result<bool, AccessError> {
        let now = self.clock.now();
        let entry = AccessLogEntry::new(AccessOperation::Verify, now)
            .with_memo(memo_id)
            .with_requester(&requester.domain, &requester.identity);

        let check = self.readable(memo_id, now).and_then(|record| {
            if verify(key, &record.key_hash) {
                Ok(())
            } else {
                Err(AccessError::KeyMismatch)
            }
        });

        match self.finish(entry, check) {
            Ok(()) => Ok(true),
            Err(e) if e.denial_reason().is_some() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Look up a memo that has not expired.
    fn readable(&self, memo_id: &str, now: DateTime<Utc>) -> Result<MemoRecord, AccessError> {
        let record = self.store.get_for_read(memo_id)?;
        if record.is_expired(now) {
            return Err(AccessError::Expired);
        }
        Ok(record)
    }

    /// Audit a decided outcome, then hand it back.
    fn finish<T>(
        &self,
        entry: AccessLogEntry,
        outcome: Result<T, AccessError>,
    ) -> Result<T, AccessError> {
        let entry = match &outcome {
            Ok(_) => entry.granted(),
            Err(e) => match e.denial_reason() {
                Some(reason) => entry.denied(reason),
                None => return outcome,
            },
        };

        if entry.granted {
            info!(
                memo_id = entry.memo_id.as_deref().unwrap_or("-"),
                operation = ?entry.operation,
                requesting_domain = %entry.requesting_domain,
                requesting_identity = %entry.requesting_identity,
                granted = true,
                "Memo access granted"
            );
        } else {
            warn!(
                memo_id = entry.memo_id.as_deref().unwrap_or("-"),
                operation = ?entry.operation,
                requesting_domain = %entry.requesting_domain,
                requesting_identity = %entry.requesting_identity,
                granted = false,
                reason = entry.denial_reason.map(|r| r.as_str()).unwrap_or("-"),
                "Memo access denied"
            );
        }

        self.auditor.log(&entry).map_err(AccessError::Storage)?;
        outcome
    }
}

/// Verify the key digest, then decrypt.
fn open(record: &MemoRecord, key: &Key) -> Result<Vec<u8>, AccessError> {
    if !verify(key, &record.key_hash) {
        return Err(AccessError::KeyMismatch);
    }
    decrypt(&record.ciphertext, key, &record.iv).map_err(|_| AccessError::DecryptFailed)
}

fn validate_create(request: &CreateMemo, now: DateTime<Utc>) -> Result<(), CreateError> {
    if !capability::is_valid_domain(&request.owner_domain) {
        return Err(CreateError::InvalidRequest(format!(
            "invalid owner domain: {}",
            request.owner_domain
        )));
    }
    if let Some(bad) = request
        .federation
        .trusted_domains
        .iter()
        .find(|d| !capability::is_valid_domain(d))
    {
        return Err(CreateError::InvalidRequest(format!(
            "invalid trusted domain: {bad}"
        )));
    }
    if request.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err(CreateError::InvalidRequest(
            "expires_at must be in the future".to_string(),
        ));
    }
    if request
        .duration_seconds
        .is_some_and(|d| !d.is_finite() || d < 0.0)
    {
        return Err(CreateError::InvalidRequest(
            "duration_seconds must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}
