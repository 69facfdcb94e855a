// src/diagnostics.rs
//
// Append-only anomaly log and the aggregate counters derived from the final map.

use crate::chains::ChainId;
use crate::identity_store::IdentityStore;
use crate::token::{AssetIdentity, IdentityId, Token};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

/// A non-fatal anomaly with enough context to reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub method: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IdentityId>,
    #[serde(rename = "tokenA", default, skip_serializing_if = "Option::is_none")]
    pub token_a: Option<Token>,
    #[serde(rename = "tokenB", default, skip_serializing_if = "Option::is_none")]
    pub token_b: Option<Token>,
    #[serde(rename = "crosschainToken", default, skip_serializing_if = "Option::is_none")]
    pub crosschain_token: Option<AssetIdentity>,
}

impl LogEntry {
    pub fn warn(method: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, method, message)
    }

    pub fn error(method: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, method, message)
    }

    fn new(severity: Severity, method: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            method: method.to_string(),
            message: message.into(),
            id: None,
            token_a: None,
            token_b: None,
            crosschain_token: None,
        }
    }

    pub fn with_id(mut self, id: IdentityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_token_a(mut self, token: &Token) -> Self {
        self.token_a = Some(token.clone());
        self
    }

    pub fn with_token_b(mut self, token: &Token) -> Self {
        self.token_b = Some(token.clone());
        self
    }

    pub fn with_crosschain_token(mut self, identity: Option<&AssetIdentity>) -> Self {
        self.crosschain_token = identity.cloned();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Append-only; entries are never mutated or removed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DiagnosticLog {
    entries: Vec<LogEntry>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        match entry.severity {
            Severity::Error => error!(
                "{}: {} (id: {:?}, tokenA: {:?}, tokenB: {:?})",
                entry.method, entry.message, entry.id, entry.token_a, entry.token_b
            ),
            Severity::Warn => debug!("{}: {} (id: {:?})", entry.method, entry.message, entry.id),
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.len() - self.error_count()
    }
}

/// Aggregate counters over the identity store and log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStats {
    pub log_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub token_count: usize,
    /// Identities mapped on at least two chains.
    pub mapped_token_count: usize,
    pub orphan_token_count: usize,
    /// Number of chains mapped -> number of identities.
    pub mapped_tokens_by_chain_count: BTreeMap<usize, usize>,
    pub mapped_tokens_by_chain: BTreeMap<ChainId, usize>,
    pub orphan_tokens_by_chain: BTreeMap<ChainId, usize>,
}

impl MapStats {
    pub fn collect(store: &IdentityStore, log: &DiagnosticLog) -> Self {
        let mut stats = MapStats {
            log_count: log.len(),
            warning_count: log.warning_count(),
            error_count: log.error_count(),
            token_count: store.len(),
            ..Default::default()
        };

        for identity in store.identities() {
            let chains = identity.chain_count();
            *stats.mapped_tokens_by_chain_count.entry(chains).or_insert(0) += 1;

            if chains < 2 {
                if let Some(chain) = identity.addresses.keys().next() {
                    *stats.orphan_tokens_by_chain.entry(*chain).or_insert(0) += 1;
                }
                continue;
            }

            stats.mapped_token_count += 1;
            for chain in identity.addresses.keys() {
                *stats.mapped_tokens_by_chain.entry(*chain).or_insert(0) += 1;
            }
        }

        stats.orphan_token_count = stats.token_count - stats.mapped_token_count;
        stats
    }
}
