// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response bodies of the HTTP API.
//!
//! Binary fields travel as standard padded base64.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::AccessType;
use crate::vault::FederatedPayload;

pub fn encode_bytes(bytes: &[u8]) -> String {
    Base64::encode_string(bytes)
}

pub fn decode_bytes(encoded: &str) -> Option<Vec<u8>> {
    Base64::decode_vec(encoded.trim()).ok()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateMemoRequest {
    /// Recording bytes, base64.
    pub data: String,
    /// Defaults to the domain the request was addressed to.
    #[serde(default)]
    pub owner_domain: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub access_type: Option<AccessType>,
    /// Absolute expiry. Mutually exclusive with `expires_in_seconds`.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
    #[serde(default)]
    pub federation_shared: bool,
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Protect with a passphrase instead of a random key.
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateMemoResponse {
    pub memo_id: String,
    /// Capability token `domain/voice/{memo_id}#{key}`. Absent for passphrase memos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// HTTPS link suitable for a QR code.
    pub share_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub passphrase_protected: bool,
}

/// A raw key, base64url without padding.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PassphraseRequest {
    pub passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedeemRequest {
    /// Full capability token or share link.
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FederatedFetchRequest {
    pub requesting_domain: String,
    pub key: String,
}

/// Ciphertext released to a trusted peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FederatedMemoResponse {
    pub memo_id: String,
    pub owner_domain: String,
    /// AES-256-GCM ciphertext with the 16-byte tag appended, base64.
    pub ciphertext: String,
    /// 12-byte nonce, base64.
    pub iv: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<FederatedPayload> for FederatedMemoResponse {
    fn from(payload: FederatedPayload) -> Self {
        Self {
            memo_id: payload.memo_id,
            owner_domain: payload.owner_domain,
            ciphertext: encode_bytes(&payload.ciphertext),
            iv: encode_bytes(payload.iv.as_bytes()),
            content_type: payload.content_type,
            duration_seconds: payload.duration_seconds,
            expires_at: payload.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_optional_fields() {
        let request: CreateMemoRequest =
            serde_json::from_str(r#"{"data":"aGVsbG8="}"#).unwrap();
        assert_eq!(decode_bytes(&request.data).unwrap(), b"hello");
        assert!(request.owner_domain.is_none());
        assert!(!request.federation_shared);
        assert!(request.trusted_domains.is_empty());
        assert!(request.passphrase.is_none());
    }

    #[test]
    fn access_type_uses_snake_case() {
        let request: CreateMemoRequest =
            serde_json::from_str(r#"{"data":"","access_type":"direct"}"#).unwrap();
        assert_eq!(request.access_type, Some(AccessType::Direct));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_bytes("not base64!").is_none());
    }

    #[test]
    fn passphrase_response_omits_token() {
        let response = CreateMemoResponse {
            memo_id: "abc".into(),
            token: None,
            share_url: "https://alice.example/voice/abc".into(),
            expires_at: None,
            passphrase_protected: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("token").is_none());
        assert!(json.get("expires_at").is_none());
    }
}
