// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Capability Tokens
//!
//! A capability token carries everything needed to open one memo:
//!
//! ```text
//! {domain}/voice/{memo_id}#{base64url(key)}
//! ```
//!
//! The key sits in the URL fragment. Browsers never send fragments to the
//! server, so the key stays on the client when the token is opened as a link.
//! Any HTTP layer in front of this service must still avoid logging full
//! request URLs.
//!
//! `encode` never emits a scheme. `decode` strips one leading `http://` or
//! `https://` so that scanned links decode to the same triple.

use url::Url;

use crate::crypto::Key;

/// Fixed path segment between domain and memo id.
pub const VOICE_SEGMENT: &str = "voice";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("capability token has no key fragment")]
    MissingSeparator,

    #[error("capability token path is not {{domain}}/voice/{{memo_id}}")]
    MalformedPath,

    #[error("capability token key is not 32 base64url bytes")]
    InvalidKeyEncoding,
}

/// A decoded capability token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    pub domain: String,
    pub memo_id: String,
    pub key: Key,
}

impl CapabilityToken {
    pub fn new(domain: impl Into<String>, memo_id: impl Into<String>, key: Key) -> Self {
        Self {
            domain: domain.into(),
            memo_id: memo_id.into(),
            key,
        }
    }

    /// Render as the canonical token string.
    pub fn encode(&self) -> String {
        encode(&self.domain, &self.memo_id, &self.key)
    }

    /// Render as an `https://` link suitable for a QR code.
    pub fn to_url(&self) -> String {
        format!("https://{}", self.encode())
    }

    pub fn decode(token: &str) -> Result<Self, TokenError> {
        decode(token)
    }
}

/// Encode the `(domain, memo_id, key)` triple.
pub fn encode(domain: &str, memo_id: &str, key: &Key) -> String {
    format!(
        "{domain}/{VOICE_SEGMENT}/{memo_id}#{}",
        key.to_base64url()
    )
}

/// Decode a token string back into its triple.
pub fn decode(token: &str) -> Result<CapabilityToken, TokenError> {
    let (path, fragment) = token.split_once('#').ok_or(TokenError::MissingSeparator)?;
    let (domain, memo_id) = parse_path(strip_scheme(path.trim()))?;
    let key = Key::from_base64url(fragment).ok_or(TokenError::InvalidKeyEncoding)?;

    Ok(CapabilityToken {
        domain: domain.to_string(),
        memo_id: memo_id.to_string(),
        key,
    })
}

/// Best-effort extraction of the memo id from a token that failed to decode,
/// for audit entries. Never returns key material.
pub fn memo_id_hint(token: &str) -> Option<String> {
    let path = token.split('#').next()?;
    let mut segments = strip_scheme(path.trim()).split('/');
    segments.next()?;
    if segments.next()? != VOICE_SEGMENT {
        return None;
    }
    segments
        .next()
        .filter(|id| is_valid_memo_id(id))
        .map(str::to_string)
}

fn strip_scheme(path: &str) -> &str {
    path.strip_prefix("https://")
        .or_else(|| path.strip_prefix("http://"))
        .unwrap_or(path)
}

fn parse_path(path: &str) -> Result<(&str, &str), TokenError> {
    let mut segments = path.split('/');
    let (Some(domain), Some(voice), Some(memo_id), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::MalformedPath);
    };

    if voice != VOICE_SEGMENT || !is_valid_domain(domain) || !is_valid_memo_id(memo_id) {
        return Err(TokenError::MalformedPath);
    }

    Ok((domain, memo_id))
}

/// A domain is a host with an optional port, as accepted by the URL parser.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.contains(['/', '#', '?', '@']) {
        return false;
    }
    Url::parse(&format!("https://{domain}/"))
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}

/// Memo ids are non-empty URL-safe base64 strings.
pub fn is_valid_memo_id(memo_id: &str) -> bool {
    !memo_id.is_empty()
        && memo_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
