// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded memo database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `memos`: memo_id → serialized [`MemoRow`] (JSON, everything but the ciphertext)
//! - `ciphertexts`: memo_id → raw AES-GCM output
//!
//! redb serializes write transactions, so the read-modify-write in
//! `record_access` cannot lose increments.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::memo::{
    allocate_memo_id, FederationPolicy, MemoMetadata, MemoRecord, MemoStore, NewMemo,
};
use super::{StorageError, StorageResult};
use crate::crypto::{KeyDigest, Nonce, Salt};

// =============================================================================
// Table Definitions
// =============================================================================

const MEMOS: TableDefinition<&str, &[u8]> = TableDefinition::new("memos");

const CIPHERTEXTS: TableDefinition<&str, &[u8]> = TableDefinition::new("ciphertexts");

/// Persisted form of a memo minus its ciphertext.
#[derive(Debug, Serialize, Deserialize)]
struct MemoRow {
    owner_domain: String,
    iv: Nonce,
    key_hash: KeyDigest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf_salt: Option<Salt>,
    metadata: MemoMetadata,
    federation: FederationPolicy,
    expires_at: Option<DateTime<Utc>>,
    access_count: u64,
    created_at: DateTime<Utc>,
    last_accessed_at: Option<DateTime<Utc>>,
}

impl MemoRow {
    fn from_new(memo: &NewMemo) -> Self {
        Self {
            owner_domain: memo.owner_domain.clone(),
            iv: memo.iv,
            key_hash: memo.key_hash,
            kdf_salt: memo.kdf_salt,
            metadata: memo.metadata.clone(),
            federation: memo.federation.clone(),
            expires_at: memo.expires_at,
            access_count: 0,
            created_at: memo.created_at,
            last_accessed_at: None,
        }
    }

    fn into_record(self, id: &str, ciphertext: Vec<u8>) -> MemoRecord {
        MemoRecord {
            id: id.to_string(),
            owner_domain: self.owner_domain,
            ciphertext,
            iv: self.iv,
            key_hash: self.key_hash,
            kdf_salt: self.kdf_salt,
            metadata: self.metadata,
            federation: self.federation,
            expires_at: self.expires_at,
            access_count: self.access_count,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
        }
    }
}

// =============================================================================
// RedbMemoStore
// =============================================================================

pub struct RedbMemoStore {
    db: Database,
}

impl RedbMemoStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MEMOS)?;
            let _ = write_txn.open_table(CIPHERTEXTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl MemoStore for RedbMemoStore {
    fn create(&self, memo: NewMemo) -> StorageResult<String> {
        let row = MemoRow::from_new(&memo);
        let json = serde_json::to_vec(&row)?;

        let write_txn = self.db.begin_write()?;
        let memo_id = {
            let mut memos = write_txn.open_table(MEMOS)?;
            let id = allocate_memo_id(|candidate| Ok(memos.get(candidate)?.is_some()))?;
            memos.insert(id.as_str(), json.as_slice())?;

            let mut ciphertexts = write_txn.open_table(CIPHERTEXTS)?;
            ciphertexts.insert(id.as_str(), memo.ciphertext.as_slice())?;
            id
        };
        write_txn.commit()?;

        Ok(memo_id)
    }

    fn get_for_read(&self, memo_id: &str) -> StorageResult<MemoRecord> {
        let read_txn = self.db.begin_read()?;

        let memos = read_txn.open_table(MEMOS)?;
        let row: MemoRow = match memos.get(memo_id)? {
            Some(value) => serde_json::from_slice(value.value())?,
            None => return Err(StorageError::NotFound(format!("Memo {memo_id}"))),
        };

        let ciphertexts = read_txn.open_table(CIPHERTEXTS)?;
        let ciphertext = ciphertexts
            .get(memo_id)?
            .map(|value| value.value().to_vec())
            .ok_or_else(|| {
                StorageError::IntegrityViolation(format!("Memo {memo_id} has no ciphertext"))
            })?;

        Ok(row.into_record(memo_id, ciphertext))
    }

    fn record_access(&self, memo_id: &str, at: DateTime<Utc>) -> StorageResult<u64> {
        let write_txn = self.db.begin_write()?;
        let access_count = {
            let mut memos = write_txn.open_table(MEMOS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = memos
                    .get(memo_id)?
                    .ok_or_else(|| StorageError::NotFound(format!("Memo {memo_id}")))?;
                existing.value().to_vec()
            };

            let mut row: MemoRow = serde_json::from_slice(&existing_bytes)?;
            row.access_count = row.access_count.saturating_add(1);
            row.last_accessed_at = Some(at);

            let json = serde_json::to_vec(&row)?;
            memos.insert(memo_id, json.as_slice())?;
            row.access_count
        };
        write_txn.commit()?;

        Ok(access_count)
    }

    fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(MEMOS)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::crypto::{decrypt, verify};
    use crate::storage::memo::test_support::sample_memo;

    fn temp_db() -> (RedbMemoStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = RedbMemoStore::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn create_and_get_memo() {
        let (db, _dir) = temp_db();
        let (memo, key) = sample_memo("alice.example", FederationPolicy::shared_with(["bob.example"]));
        let expected_ciphertext = memo.ciphertext.clone();

        let id = db.create(memo).unwrap();
        let record = db.get_for_read(&id).unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.owner_domain, "alice.example");
        assert_eq!(record.ciphertext, expected_ciphertext);
        assert_eq!(record.access_count, 0);
        assert!(record.last_accessed_at.is_none());
        assert!(record.federation.trusts("bob.example"));
        assert!(verify(&key, &record.key_hash));
        assert_eq!(
            decrypt(&record.ciphertext, &key, &record.iv).unwrap(),
            b"sample audio"
        );
    }

    #[test]
    fn unknown_memo_is_not_found() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.get_for_read("nope"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            db.record_access("nope", Utc::now()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn record_access_increments_and_stamps() {
        let (db, _dir) = temp_db();
        let (memo, _) = sample_memo("alice.example", FederationPolicy::private());
        let id = db.create(memo).unwrap();

        let at = Utc::now();
        assert_eq!(db.record_access(&id, at).unwrap(), 1);
        assert_eq!(db.record_access(&id, at).unwrap(), 2);

        let record = db.get_for_read(&id).unwrap();
        assert_eq!(record.access_count, 2);
        assert_eq!(record.last_accessed_at, Some(at));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let (memo, _) = sample_memo("alice.example", FederationPolicy::private());
        let id = db.create(memo).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        db.record_access(&id, Utc::now()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(db.get_for_read(&id).unwrap().access_count, 80);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memos.redb");
        let id = {
            let db = RedbMemoStore::open(&path).unwrap();
            let (memo, _) = sample_memo("alice.example", FederationPolicy::private());
            let id = db.create(memo).unwrap();
            db.record_access(&id, Utc::now()).unwrap();
            id
        };

        let db = RedbMemoStore::open(&path).unwrap();
        assert_eq!(db.get_for_read(&id).unwrap().access_count, 1);
        db.health_check().unwrap();
    }
}
