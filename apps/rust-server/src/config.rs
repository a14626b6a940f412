// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values and the [`Config`] loaded from
//! them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for `memos.redb` and `audit/` | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOCAL_DOMAIN` | Domain this deployment serves by default | `localhost` |
//! | `HOSTED_DOMAINS` | Extra comma-separated owner domains | empty |
//! | `FEDERATION_PEER_SECRETS` | `domain=secret,...` HMAC secrets for peers | empty |
//! | `FEDERATION_REQUIRE_SIGNATURES` | Deny unsigned federated fetches | `false` |
//! | `MAX_MEMO_BYTES` | Upload body limit in bytes, at most 1 GiB | `10485760` |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS with `TLS_KEY_PATH` | unset |
//! | `TLS_KEY_PATH` | PEM private key | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::capability::is_valid_domain;
use crate::federation::PeerKeyring;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
///
/// Holds the memo database and the daily audit logs.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Domain used for tokens when the request carries no usable `Host`.
pub const LOCAL_DOMAIN_ENV: &str = "LOCAL_DOMAIN";

pub const HOSTED_DOMAINS_ENV: &str = "HOSTED_DOMAINS";

/// Shared peer secrets, `bob.example=s3cret,carol.example=other`.
pub const FEDERATION_PEER_SECRETS_ENV: &str = "FEDERATION_PEER_SECRETS";

pub const FEDERATION_REQUIRE_SIGNATURES_ENV: &str = "FEDERATION_REQUIRE_SIGNATURES";
pub const MAX_MEMO_BYTES_ENV: &str = "MAX_MEMO_BYTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOCAL_DOMAIN: &str = "localhost";
pub const DEFAULT_MAX_MEMO_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound accepted for `MAX_MEMO_BYTES`.
pub const MAX_MEMO_BYTES_LIMIT: usize = 1024 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} is set but {1} is not")]
    Incomplete(&'static str, &'static str),
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Certificate and key paths for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub local_domain: String,
    /// Always contains `local_domain`.
    pub hosted_domains: BTreeSet<String>,
    pub peers: PeerKeyring,
    pub max_memo_bytes: usize,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let local_domain = DEFAULT_LOCAL_DOMAIN.to_string();
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            hosted_domains: BTreeSet::from([local_domain.clone()]),
            local_domain,
            peers: PeerKeyring::default(),
            max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
            tls: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::invalid(HOST_ENV, format!("not an IP address: {host}")))?;

        let local_domain = get(LOCAL_DOMAIN_ENV)
            .unwrap_or_else(|| DEFAULT_LOCAL_DOMAIN.to_string())
            .to_ascii_lowercase();
        if !is_valid_domain(&local_domain) {
            return Err(ConfigError::invalid(LOCAL_DOMAIN_ENV, local_domain));
        }

        let mut hosted_domains = BTreeSet::from([local_domain.clone()]);
        for domain in split_list(get(HOSTED_DOMAINS_ENV).as_deref()) {
            let domain = domain.to_ascii_lowercase();
            if !is_valid_domain(&domain) {
                return Err(ConfigError::invalid(HOSTED_DOMAINS_ENV, domain));
            }
            hosted_domains.insert(domain);
        }

        let require_signatures = match get(FEDERATION_REQUIRE_SIGNATURES_ENV) {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::invalid(FEDERATION_REQUIRE_SIGNATURES_ENV, raw))?,
            None => false,
        };
        let mut peers = PeerKeyring::new(require_signatures);
        for pair in split_list(get(FEDERATION_PEER_SECRETS_ENV).as_deref()) {
            let (domain, secret) = pair
                .split_once('=')
                .map(|(d, s)| (d.trim(), s.trim()))
                .filter(|(d, s)| is_valid_domain(d) && !s.is_empty())
                .ok_or_else(|| {
                    ConfigError::invalid(
                        FEDERATION_PEER_SECRETS_ENV,
                        "expected domain=secret pairs",
                    )
                })?;
            peers = peers.with_peer(domain, secret.as_bytes().to_vec());
        }

        let max_memo_bytes = match get(MAX_MEMO_BYTES_ENV) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_MEMO_BYTES_LIMIT).contains(n))
                .ok_or_else(|| ConfigError::invalid(MAX_MEMO_BYTES_ENV, raw))?,
            None => DEFAULT_MAX_MEMO_BYTES,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(TLS_KEY_PATH_ENV, TLS_CERT_PATH_ENV))
            }
            (None, None) => None,
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::invalid(LOG_FORMAT_ENV, other)),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            local_domain,
            hosted_domains,
            peers,
            max_memo_bytes,
            tls,
            log_format,
        })
    }

    /// Whether memos may be created for `domain` on this server.
    pub fn hosts(&self, domain: &str) -> bool {
        self.hosted_domains.contains(&domain.to_ascii_lowercase())
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
