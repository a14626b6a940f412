// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store and auditor for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::audit::{AccessAuditor, AccessLogEntry};
use super::memo::{allocate_memo_id, MemoRecord, MemoStore, NewMemo};
use super::{StorageError, StorageResult};

#[derive(Debug, Default)]
pub struct InMemoryMemoStore {
    memos: RwLock<HashMap<String, MemoRecord>>,
}

impl InMemoryMemoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, for inspection in tests.
    pub fn records(&self) -> StorageResult<Vec<MemoRecord>> {
        let memos = self.memos.read().map_err(|_| StorageError::Poisoned)?;
        Ok(memos.values().cloned().collect())
    }
}

impl MemoStore for InMemoryMemoStore {
    fn create(&self, memo: NewMemo) -> StorageResult<String> {
        let mut memos = self.memos.write().map_err(|_| StorageError::Poisoned)?;
        let id = allocate_memo_id(|candidate| Ok(memos.contains_key(candidate)))?;
        memos.insert(id.clone(), MemoRecord::from_new(id.clone(), memo));
        Ok(id)
    }

    fn get_for_read(&self, memo_id: &str) -> StorageResult<MemoRecord> {
        let memos = self.memos.read().map_err(|_| StorageError::Poisoned)?;
        memos
            .get(memo_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Memo {memo_id}")))
    }

    fn record_access(&self, memo_id: &str, at: DateTime<Utc>) -> StorageResult<u64> {
        let mut memos = self.memos.write().map_err(|_| StorageError::Poisoned)?;
        let record = memos
            .get_mut(memo_id)
            .ok_or_else(|| StorageError::NotFound(format!("Memo {memo_id}")))?;
        record.access_count = record.access_count.saturating_add(1);
        record.last_accessed_at = Some(at);
        Ok(record.access_count)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAccessAuditor {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl InMemoryAccessAuditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AccessAuditor for InMemoryAccessAuditor {
    fn log(&self, entry: &AccessLogEntry) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.push(entry.clone());
        Ok(())
    }
}
