// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Config;
use crate::federation::FederationGate;
use crate::storage::{AccessAuditor, InMemoryAccessAuditor, InMemoryMemoStore, MemoStore};
use crate::vault::MemoVault;

#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<MemoVault>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(vault: MemoVault, config: Config) -> Self {
        Self {
            vault: Arc::new(vault),
            config: Arc::new(config),
        }
    }

    /// Wire a vault from the given stores and the configured peers.
    pub fn from_stores(
        config: Config,
        store: Arc<dyn MemoStore>,
        auditor: Arc<dyn AccessAuditor>,
    ) -> Self {
        let gate = FederationGate::new(config.peers.clone());
        Self::new(MemoVault::new(store, auditor, gate), config)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_stores(
            Config::default(),
            Arc::new(InMemoryMemoStore::new()),
            Arc::new(InMemoryAccessAuditor::new()),
        )
    }
}
