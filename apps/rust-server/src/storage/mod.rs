// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Memo Storage
//!
//! The only stateful part of the service. Two concerns live here:
//!
//! - [`MemoStore`]: encrypted memo records. Ciphertext, IV, key digest and
//!   federation policy are written once at creation. `access_count` and
//!   `last_accessed_at` change only through [`MemoStore::record_access`].
//! - [`AccessAuditor`]: append-only log of every access attempt.
//!
//! Both are traits so the service can be wired to the redb/JSONL backends in
//! production and to in-memory doubles in tests.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   memos.redb                 # memo records + ciphertexts
//!   audit/
//!     {date}/access.jsonl      # daily access logs
//! ```
//!
//! Raw keys are never handed to this module; only their SHA-256 digests.

pub mod audit;
pub mod memo;
pub mod memo_db;
pub mod memory;
pub mod paths;

use std::io;

pub use audit::{
    AccessAuditor, AccessLogEntry, AccessOperation, DenialReason, JsonlAccessAuditor,
};
pub use memo::{
    is_expired, AccessType, FederationPolicy, MemoMetadata, MemoRecord, MemoStore, NewMemo,
};
pub use memo_db::RedbMemoStore;
pub use memory::{InMemoryAccessAuditor, InMemoryMemoStore};
pub use paths::StoragePaths;

use crate::crypto::CryptoError;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("could not allocate memo id: {0}")]
    IdAllocation(#[from] CryptoError),

    #[error("memo id collision after {0} attempts")]
    IdCollision(usize),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
