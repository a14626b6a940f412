// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access audit log.
//!
//! Every read, fetch, unlock, redeem and verify attempt produces exactly one
//! entry, granted or not. Entries carry the precise denial reason; callers
//! outside the service only ever see a generic denial.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{StorageError, StoragePaths, StorageResult};

/// Why an access attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotFound,
    Expired,
    FederationNotEnabled,
    DomainNotTrusted,
    /// A foreign domain asked for plaintext; only ciphertext is ever federated.
    CrossDomainRead,
    PeerUnauthenticated,
    KeyMismatch,
    DecryptFailed,
    TokenMalformed,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NotFound => "not_found",
            DenialReason::Expired => "expired",
            DenialReason::FederationNotEnabled => "federation_not_enabled",
            DenialReason::DomainNotTrusted => "domain_not_trusted",
            DenialReason::CrossDomainRead => "cross_domain_read",
            DenialReason::PeerUnauthenticated => "peer_unauthenticated",
            DenialReason::KeyMismatch => "key_mismatch",
            DenialReason::DecryptFailed => "decrypt_failed",
            DenialReason::TokenMalformed => "token_malformed",
        }
    }
}

/// Which entry point produced the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOperation {
    LocalRead,
    PassphraseUnlock,
    TokenRedeem,
    FederatedFetch,
    Verify,
}

/// One access attempt. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: AccessOperation,
    /// May be absent when a malformed token hid the id.
    pub memo_id: Option<String>,
    pub requesting_domain: String,
    /// Network identity of the requester (usually an IP address).
    pub requesting_identity: String,
    pub granted: bool,
    pub denial_reason: Option<DenialReason>,
}

impl AccessLogEntry {
    /// Start an entry. Entries are denials until marked [`granted`](Self::granted).
    pub fn new(operation: AccessOperation, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            operation,
            memo_id: None,
            requesting_domain: String::new(),
            requesting_identity: "unknown".to_string(),
            granted: false,
            denial_reason: None,
        }
    }

    pub fn with_memo(mut self, memo_id: impl Into<String>) -> Self {
        self.memo_id = Some(memo_id.into());
        self
    }

    pub fn with_requester(
        mut self,
        domain: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        self.requesting_domain = domain.into();
        self.requesting_identity = identity.into();
        self
    }

    pub fn granted(mut self) -> Self {
        self.granted = true;
        self.denial_reason = None;
        self
    }

    pub fn denied(mut self, reason: DenialReason) -> Self {
        self.granted = false;
        self.denial_reason = Some(reason);
        self
    }
}

/// Append-only sink for access entries.
///
/// A failed `log` is fatal to the operation that produced the entry.
pub trait AccessAuditor: Send + Sync {
    fn log(&self, entry: &AccessLogEntry) -> StorageResult<()>;
}

/// Daily JSONL files under `{DATA_DIR}/audit/{date}/access.jsonl`.
pub struct JsonlAccessAuditor {
    paths: StoragePaths,
    write_lock: Mutex<()>,
}

impl JsonlAccessAuditor {
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the audit directory.
    pub fn initialize(&self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.audit_dir())?;
        Ok(())
    }

    /// Read all entries for a date (`YYYY-MM-DD`).
    pub fn read_entries(&self, date: &str) -> StorageResult<Vec<AccessLogEntry>> {
        let path = self.paths.access_log_file(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    /// Read entries for an inclusive date range.
    ///
    /// Operator diagnosis helper; the service itself only appends.
    pub fn read_entries_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AccessLogEntry>> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;

        let mut all = Vec::new();
        let mut current = start;
        while current <= end {
            all.extend(self.read_entries(&current.format("%Y-%m-%d").to_string())?);
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::IntegrityViolation("date overflow".to_string()))?;
        }
        Ok(all)
    }

    /// Entries for one memo on a given date. Operator diagnosis helper.
    pub fn search_by_memo(&self, memo_id: &str, date: &str) -> StorageResult<Vec<AccessLogEntry>> {
        Ok(self
            .read_entries(date)?
            .into_iter()
            .filter(|e| e.memo_id.as_deref() == Some(memo_id))
            .collect())
    }
}

fn parse_date(date: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| StorageError::IntegrityViolation(format!("invalid date {date}: {e}")))
}

impl AccessAuditor for JsonlAccessAuditor {
    fn log(&self, entry: &AccessLogEntry) -> StorageResult<()> {
        let date = entry.timestamp.format("%Y-%m-%d").to_string();
        let path = self.paths.access_log_file(&date);

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonlAccessAuditor) {
        let temp = TempDir::new().unwrap();
        let auditor = JsonlAccessAuditor::new(StoragePaths::new(temp.path()));
        auditor.initialize().unwrap();
        (temp, auditor)
    }

    #[test]
    fn entries_default_to_denied() {
        let entry = AccessLogEntry::new(AccessOperation::LocalRead, Utc::now())
            .with_memo("m1")
            .with_requester("alice.example", "10.0.0.1");

        assert!(!entry.granted);
        assert_eq!(entry.memo_id.as_deref(), Some("m1"));
        assert_eq!(entry.requesting_domain, "alice.example");
        assert_eq!(entry.requesting_identity, "10.0.0.1");

        let granted = entry.clone().granted();
        assert!(granted.granted);
        assert!(granted.denial_reason.is_none());

        let denied = entry.denied(DenialReason::Expired);
        assert_eq!(denied.denial_reason, Some(DenialReason::Expired));
    }

    #[test]
    fn log_and_read_entries() {
        let (_temp, auditor) = setup();
        let now = Utc::now();

        auditor
            .log(&AccessLogEntry::new(AccessOperation::LocalRead, now).with_memo("m1").granted())
            .unwrap();
        auditor
            .log(
                &AccessLogEntry::new(AccessOperation::FederatedFetch, now)
                    .with_memo("m2")
                    .denied(DenialReason::DomainNotTrusted),
            )
            .unwrap();

        let today = now.format("%Y-%m-%d").to_string();
        let entries = auditor.read_entries(&today).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, AccessOperation::LocalRead);
        assert!(entries[0].granted);
        assert_eq!(entries[1].denial_reason, Some(DenialReason::DomainNotTrusted));

        assert_eq!(auditor.search_by_memo("m2", &today).unwrap().len(), 1);
    }

    #[test]
    fn missing_day_reads_empty() {
        let (_temp, auditor) = setup();
        assert!(auditor.read_entries("1999-01-01").unwrap().is_empty());
    }

    #[test]
    fn range_spans_day_files() {
        let (_temp, auditor) = setup();
        let day1 = Utc::now() - Duration::days(1);
        let day2 = Utc::now();

        auditor
            .log(&AccessLogEntry::new(AccessOperation::Verify, day1).granted())
            .unwrap();
        auditor
            .log(&AccessLogEntry::new(AccessOperation::Verify, day2).granted())
            .unwrap();

        let entries = auditor
            .read_entries_range(
                &day1.format("%Y-%m-%d").to_string(),
                &day2.format("%Y-%m-%d").to_string(),
            )
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn denial_reasons_serialize_snake_case() {
        for reason in [
            DenialReason::NotFound,
            DenialReason::FederationNotEnabled,
            DenialReason::CrossDomainRead,
            DenialReason::TokenMalformed,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }
}
