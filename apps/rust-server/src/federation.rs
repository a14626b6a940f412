// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Federation Gate
//!
//! Decides whether a domain other than a memo's owner may fetch it. The
//! decision never looks at the presented key:
//!
//! 1. owner domain: always allowed
//! 2. `federation_shared == false`: [`FederationDenial::FederationNotEnabled`]
//! 3. domain not in `trusted_domains`: [`FederationDenial::DomainNotTrusted`]
//! 4. otherwise allowed
//!
//! Peers can additionally be pinned to a shared HMAC-SHA256 secret. A signed
//! fetch carries `base64url(HMAC(secret, "{domain}\n{memo_id}"))`.

use std::collections::HashMap;
use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::storage::{DenialReason, MemoRecord};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying a peer's request signature.
pub const SIGNATURE_HEADER: &str = "x-federation-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FederationDenial {
    #[error("memo is not shared with other domains")]
    FederationNotEnabled,

    #[error("requesting domain is not trusted by this memo")]
    DomainNotTrusted,

    #[error("plaintext is only released to the owner domain")]
    CrossDomainRead,

    #[error("peer signature missing or invalid")]
    PeerUnauthenticated,
}

impl From<FederationDenial> for DenialReason {
    fn from(denial: FederationDenial) -> Self {
        match denial {
            FederationDenial::FederationNotEnabled => DenialReason::FederationNotEnabled,
            FederationDenial::DomainNotTrusted => DenialReason::DomainNotTrusted,
            FederationDenial::CrossDomainRead => DenialReason::CrossDomainRead,
            FederationDenial::PeerUnauthenticated => DenialReason::PeerUnauthenticated,
        }
    }
}

/// Evaluate the sharing policy of `record` for `requesting_domain`.
pub fn authorize(record: &MemoRecord, requesting_domain: &str) -> Result<(), FederationDenial> {
    if requesting_domain.eq_ignore_ascii_case(&record.owner_domain) {
        return Ok(());
    }
    if !record.federation.federation_shared {
        return Err(FederationDenial::FederationNotEnabled);
    }
    if !record.federation.trusts(requesting_domain) {
        return Err(FederationDenial::DomainNotTrusted);
    }
    Ok(())
}

/// Shared secrets for federation peers.
#[derive(Clone, Default)]
pub struct PeerKeyring {
    secrets: HashMap<String, Vec<u8>>,
    require_signatures: bool,
}

impl fmt::Debug for PeerKeyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut peers: Vec<_> = self.secrets.keys().collect();
        peers.sort();
        f.debug_struct("PeerKeyring")
            .field("peers", &peers)
            .field("require_signatures", &self.require_signatures)
            .finish()
    }
}

impl PeerKeyring {
    pub fn new(require_signatures: bool) -> Self {
        Self {
            secrets: HashMap::new(),
            require_signatures,
        }
    }

    pub fn with_peer(mut self, domain: impl AsRef<str>, secret: impl Into<Vec<u8>>) -> Self {
        self.secrets
            .insert(domain.as_ref().to_ascii_lowercase(), secret.into());
        self
    }

    pub fn has_peer(&self, domain: &str) -> bool {
        self.secrets.contains_key(&domain.to_ascii_lowercase())
    }

    /// Check a request signature.
    ///
    /// Unsigned requests pass only when the domain has no secret and
    /// signatures are not required.
    pub fn authenticate(
        &self,
        requesting_domain: &str,
        memo_id: &str,
        signature: Option<&str>,
    ) -> Result<(), FederationDenial> {
        let secret = self.secrets.get(&requesting_domain.to_ascii_lowercase());

        match (secret, signature) {
            (None, None) if !self.require_signatures => Ok(()),
            (Some(secret), Some(signature)) => {
                let presented = Base64UrlUnpadded::decode_vec(signature.trim_end_matches('='))
                    .map_err(|_| FederationDenial::PeerUnauthenticated)?;
                peer_mac(secret, requesting_domain, memo_id)?
                    .verify_slice(&presented)
                    .map_err(|_| FederationDenial::PeerUnauthenticated)
            }
            _ => Err(FederationDenial::PeerUnauthenticated),
        }
    }
}

fn peer_mac(
    secret: &[u8],
    requesting_domain: &str,
    memo_id: &str,
) -> Result<HmacSha256, FederationDenial> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| FederationDenial::PeerUnauthenticated)?;
    mac.update(requesting_domain.to_ascii_lowercase().as_bytes());
    mac.update(b"\n");
    mac.update(memo_id.as_bytes());
    Ok(mac)
}

/// Produce the signature a peer attaches to a fetch of `memo_id`.
pub fn sign_fetch(secret: &[u8], requesting_domain: &str, memo_id: &str) -> Option<String> {
    let mac = peer_mac(secret, requesting_domain, memo_id).ok()?;
    Some(Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
}

/// Policy evaluation plus peer authentication.
#[derive(Debug, Clone, Default)]
pub struct FederationGate {
    peers: PeerKeyring,
}

impl FederationGate {
    pub fn new(peers: PeerKeyring) -> Self {
        Self { peers }
    }

    pub fn authorize(
        &self,
        record: &MemoRecord,
        requesting_domain: &str,
    ) -> Result<(), FederationDenial> {
        authorize(record, requesting_domain)
    }

    pub fn authenticate_peer(
        &self,
        requesting_domain: &str,
        memo_id: &str,
        signature: Option<&str>,
    ) -> Result<(), FederationDenial> {
        self.peers.authenticate(requesting_domain, memo_id, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memo::test_support::sample_memo;
    use crate::storage::FederationPolicy;

    fn record(policy: FederationPolicy) -> MemoRecord {
        let (memo, _) = sample_memo("alice.example", policy);
        MemoRecord::from_new("memo-1".to_string(), memo)
    }

    #[test]
    fn owner_is_always_allowed() {
        let private = record(FederationPolicy::private());
        assert_eq!(authorize(&private, "alice.example"), Ok(()));
        assert_eq!(authorize(&private, "ALICE.example"), Ok(()));
    }

    #[test]
    fn unshared_memo_denies_everyone_else() {
        let mut private = record(FederationPolicy::private());
        // A trust list without the sharing flag grants nothing.
        private.federation.trusted_domains.insert("bob.example".into());
        assert_eq!(
            authorize(&private, "bob.example"),
            Err(FederationDenial::FederationNotEnabled)
        );
    }

    #[test]
    fn shared_memo_checks_trust_list() {
        let shared = record(FederationPolicy::shared_with(["bob.example"]));
        assert_eq!(authorize(&shared, "bob.example"), Ok(()));
        assert_eq!(
            authorize(&shared, "mallory.example"),
            Err(FederationDenial::DomainNotTrusted)
        );
    }

    #[test]
    fn shared_with_nobody_trusts_nobody() {
        let shared = record(FederationPolicy::shared_with(Vec::<String>::new()));
        assert_eq!(
            authorize(&shared, "bob.example"),
            Err(FederationDenial::DomainNotTrusted)
        );
    }

    #[test]
    fn unsigned_requests_pass_only_for_unpinned_peers() {
        let open = PeerKeyring::new(false).with_peer("bob.example", b"s3cret".to_vec());
        assert_eq!(open.authenticate("carol.example", "m1", None), Ok(()));
        assert_eq!(
            open.authenticate("bob.example", "m1", None),
            Err(FederationDenial::PeerUnauthenticated)
        );

        let strict = PeerKeyring::new(true);
        assert_eq!(
            strict.authenticate("carol.example", "m1", None),
            Err(FederationDenial::PeerUnauthenticated)
        );
    }

    #[test]
    fn signatures_bind_domain_and_memo() {
        let keyring = PeerKeyring::new(true).with_peer("Bob.Example", b"s3cret".to_vec());
        let signature = sign_fetch(b"s3cret", "bob.example", "m1").unwrap();

        assert_eq!(
            keyring.authenticate("bob.example", "m1", Some(&signature)),
            Ok(())
        );
        assert_eq!(
            keyring.authenticate("bob.example", "m2", Some(&signature)),
            Err(FederationDenial::PeerUnauthenticated)
        );
        assert_eq!(
            keyring.authenticate("bob.example", "m1", Some("garbage!")),
            Err(FederationDenial::PeerUnauthenticated)
        );

        let forged = sign_fetch(b"wrong", "bob.example", "m1").unwrap();
        assert_eq!(
            keyring.authenticate("bob.example", "m1", Some(&forged)),
            Err(FederationDenial::PeerUnauthenticated)
        );
    }

    #[test]
    fn signature_for_unknown_peer_is_rejected() {
        let keyring = PeerKeyring::new(false);
        let signature = sign_fetch(b"s3cret", "carol.example", "m1").unwrap();
        assert_eq!(
            keyring.authenticate("carol.example", "m1", Some(&signature)),
            Err(FederationDenial::PeerUnauthenticated)
        );
    }

    #[test]
    fn keyring_debug_hides_secrets() {
        let keyring = PeerKeyring::new(false).with_peer("bob.example", b"hunter2".to_vec());
        let rendered = format!("{keyring:?}");
        assert!(rendered.contains("bob.example"));
        assert!(!rendered.contains("hunter2"));
        assert!(keyring.has_peer("BOB.example"));
    }
}
