// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request metadata extractors.
//!
//! ```rust,ignore
//! async fn handler(
//!     RequestDomain(domain): RequestDomain,
//!     ClientIdentity(identity): ClientIdentity,
//! ) { /* ... */ }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::HOST, request::Parts, HeaderMap},
};

use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Network identity of the caller, recorded in audit entries.
///
/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer
/// address, then `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIdentity(client_identity(&parts.headers, peer)))
    }
}

pub fn client_identity(headers: &HeaderMap, peer: Option<String>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(X_REAL_IP))
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Domain a request was addressed to.
///
/// The `Host` hostname when it is one of this server's hosted domains,
/// otherwise the configured local domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDomain(pub String);

impl FromRequestParts<AppState> for RequestDomain {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let domain = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(hostname)
            .filter(|host| state.config.hosts(host))
            .unwrap_or_else(|| state.config.local_domain.clone());
        Ok(RequestDomain(domain))
    }
}

/// Lowercased host without a port.
fn hostname(host: &str) -> String {
    let host = host.trim();
    let bare = if host.starts_with('[') {
        host.split_inclusive(']').next().unwrap_or(host)
    } else {
        host.split(':').next().unwrap_or(host)
    };
    bare.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn identity_prefers_forwarded_for() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_identity(&h, Some("127.0.0.1".into())), "203.0.113.7");
    }

    #[test]
    fn identity_falls_back_in_order() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_identity(&h, Some("127.0.0.1".into())), "198.51.100.2");

        let h = headers(&[("x-forwarded-for", " ")]);
        assert_eq!(client_identity(&h, Some("127.0.0.1".into())), "127.0.0.1");

        assert_eq!(client_identity(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn hostname_strips_port() {
        assert_eq!(hostname("Alice.Example:8443"), "alice.example");
        assert_eq!(hostname("localhost"), "localhost");
        assert_eq!(hostname("[::1]:8080"), "[::1]");
    }

    #[tokio::test]
    async fn request_domain_uses_hosted_host_only() {
        let state = AppState::default();

        let (mut parts, _) = Request::builder()
            .header(HOST, "LOCALHOST:8080")
            .body(())
            .unwrap()
            .into_parts();
        let RequestDomain(domain) = RequestDomain::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(domain, "localhost");

        let (mut parts, _) = Request::builder()
            .header(HOST, "attacker.example")
            .body(())
            .unwrap()
            .into_parts();
        let RequestDomain(domain) = RequestDomain::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(domain, state.config.local_domain);
    }

    #[tokio::test]
    async fn client_identity_reads_connect_info() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        let ClientIdentity(identity) = ClientIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity, "192.0.2.1");
    }
}
