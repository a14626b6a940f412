// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Voice Capsule - Encrypted Capability Store for Voice Memos
//!
//! Recordings are sealed with AES-256-GCM under a per-memo key that only
//! ever leaves the server inside a capability token. The server keeps the
//! SHA-256 digest of the key, the ciphertext and an append-only access log.
//!
//! ## Modules
//!
//! - `crypto` - AES-256-GCM, PBKDF2 and key digests (ring)
//! - `capability` - `domain/voice/{memo_id}#{key}` tokens
//! - `storage` - memo store (redb) and access audit log (JSONL)
//! - `federation` - cross-domain sharing policy and peer signatures
//! - `vault` - create / read / fetch / verify flows
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod capability;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod federation;
pub mod models;
pub mod state;
pub mod storage;
pub mod vault;
