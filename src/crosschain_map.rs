// src/crosschain_map.rs
//
// Pairing engine: turns same-asset claims into identity store mutations.
// Every claim is either committed as a unit or rejected before anything changes.

use crate::chains::SupportedChains;
use crate::diagnostics::{DiagnosticLog, LogEntry, MapStats};
use crate::error::MapError;
use crate::identity_store::{ExtendError, ExtendPlan, IdentityStore};
use crate::sources::ClaimSource;
use crate::token::{AssetIdentity, Claim, IdentityId, RawClaim, Token};
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::time::Instant;

/// Result of merging one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Neither token was known; a new identity was created from token A.
    Created(IdentityId),
    /// One side was known; the other joined its identity.
    Extended(IdentityId),
    /// Both sides already map to this identity. Nothing changed.
    Reused(IdentityId),
    /// Both sides are mapped, to different identities. Nothing changed.
    Conflict { a: IdentityId, b: IdentityId },
    /// The claim contradicts the store and was dropped before any mutation.
    Rejected { id: Option<IdentityId> },
}

impl PairOutcome {
    /// Identity the claim ended up attached to, if any.
    pub fn id(&self) -> Option<IdentityId> {
        match self {
            PairOutcome::Created(id) | PairOutcome::Extended(id) | PairOutcome::Reused(id) => Some(*id),
            PairOutcome::Conflict { a, .. } => Some(*a),
            PairOutcome::Rejected { id } => *id,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, PairOutcome::Created(_) | PairOutcome::Extended(_))
    }
}

/// Per-batch outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingReport {
    pub created: usize,
    pub extended: usize,
    pub reused: usize,
    pub conflicts: usize,
    pub rejected: usize,
}

impl PairingReport {
    pub fn record(&mut self, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Created(_) => self.created += 1,
            PairOutcome::Extended(_) => self.extended += 1,
            PairOutcome::Reused(_) => self.reused += 1,
            PairOutcome::Conflict { .. } => self.conflicts += 1,
            PairOutcome::Rejected { .. } => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.extended + self.reused + self.conflicts + self.rejected
    }
}

/// Identity store, diagnostic log and the chain set they are validated against.
#[derive(Debug, Clone, Default)]
pub struct CrosschainMap {
    store: IdentityStore,
    log: DiagnosticLog,
    supported: SupportedChains,
}

impl CrosschainMap {
    pub fn new(supported: SupportedChains) -> Self {
        Self {
            store: IdentityStore::new(),
            log: DiagnosticLog::new(),
            supported,
        }
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn supported_chains(&self) -> &SupportedChains {
        &self.supported
    }

    pub fn lookup_identity_id(&self, token: &Token) -> Option<IdentityId> {
        self.store.lookup_identity_id(token.chain, &token.address)
    }

    pub fn lookup_identity(&self, token: &Token) -> Option<&AssetIdentity> {
        self.store.lookup_identity(token.chain, &token.address)
    }

    pub fn stats(&self) -> MapStats {
        MapStats::collect(&self.store, &self.log)
    }

    fn validate(&self, token: &Token) -> Result<(), MapError> {
        self.supported.validate(token.chain)?;
        if token.address.trim().is_empty() {
            return Err(MapError::MissingAddress { chain: token.chain });
        }
        Ok(())
    }

    fn log_extend_error(&mut self, id: IdentityId, token: &Token, err: &ExtendError) {
        let entry = LogEntry::error("updateCrosschainToken", err.to_string())
            .with_id(id)
            .with_token_a(token)
            .with_crosschain_token(self.store.identity(id));
        self.log.push(entry);
    }

    fn extend(&mut self, id: IdentityId, token: &Token) {
        let before = self.store.identity(id).cloned();
        match self.store.extend_identity(id, token) {
            Ok(ExtendPlan::ReplaceAddress { previous }) => {
                let message = format!("Address replaced: {} -> {}", previous, token.normalized_address());
                let entry = LogEntry::warn("updateCrosschainToken", message)
                    .with_id(id)
                    .with_token_a(token)
                    .with_crosschain_token(before.as_ref());
                self.log.push(entry);
            }
            Ok(ExtendPlan::CorrectDecimals { from }) => {
                let message = format!("Decimals corrected: {:?} -> {}", from, token.decimals);
                let entry = LogEntry::warn("updateCrosschainToken", message)
                    .with_id(id)
                    .with_token_a(token)
                    .with_crosschain_token(before.as_ref());
                self.log.push(entry);
            }
            Ok(_) => {}
            Err(err) => self.log_extend_error(id, token, &err),
        }
    }

    fn index(&mut self, id: IdentityId, token: &Token) {
        if let Err(warning) = self.store.index_token(id, token) {
            let entry = LogEntry::warn("updateTokenMap", warning.to_string())
                .with_id(id)
                .with_token_a(token)
                .with_crosschain_token(self.store.identity(id));
            self.log.push(entry);
        }
    }

    /// Merges the claim that `token_a` and `token_b` are the same asset.
    ///
    /// Token A's name and symbol win when a new identity is created. Unsupported
    /// chains and empty addresses are fatal and leave the map untouched.
    pub fn add_pair(&mut self, token_a: &Token, token_b: &Token) -> Result<PairOutcome, MapError> {
        self.validate(token_a)?;
        self.validate(token_b)?;

        let id_a = self.lookup_identity_id(token_a);
        let id_b = self.lookup_identity_id(token_b);

        if let (Some(a), Some(b)) = (id_a, id_b) {
            if a == b {
                let entry = LogEntry::warn("addPair", "Both addresses are already mapped")
                    .with_id(a)
                    .with_token_a(token_a)
                    .with_token_b(token_b)
                    .with_crosschain_token(self.store.identity(a));
                self.log.push(entry);
                return Ok(PairOutcome::Reused(a));
            }

            let entry = LogEntry::error(
                "addPair",
                format!("Addresses are mapped to different crosschain tokens ({} / {})", a, b),
            )
            .with_id(a)
            .with_token_a(token_a)
            .with_token_b(token_b)
            .with_crosschain_token(self.store.identity(a));
            self.log.push(entry);
            return Ok(PairOutcome::Conflict { a, b });
        }

        let existing = id_a.or(id_b);

        if token_a.chain == token_b.chain && token_a.normalized_address() != token_b.normalized_address() {
            let mut entry = LogEntry::error("addPair", "Pair tokens share a chain but not an address")
                .with_token_a(token_a)
                .with_token_b(token_b);
            if let Some(id) = existing {
                entry = entry.with_id(id);
            }
            self.log.push(entry);
            return Ok(PairOutcome::Rejected { id: existing });
        }

        let (id, outcome) = match existing {
            Some(id) => {
                for token in [token_a, token_b] {
                    if let Err(err) = self.store.check_extend(id, token) {
                        self.log_extend_error(id, token, &err);
                        return Ok(PairOutcome::Rejected { id: Some(id) });
                    }
                }
                (id, PairOutcome::Extended(id))
            }
            None => {
                let id = self.store.create_identity(token_a);
                (id, PairOutcome::Created(id))
            }
        };

        self.extend(id, token_a);
        self.index(id, token_a);
        self.extend(id, token_b);
        self.index(id, token_b);

        Ok(outcome)
    }

    /// Applies claims in order. Each claim commits or is rejected on its own.
    pub fn add_pairs<'a, I>(&mut self, claims: I) -> Result<PairingReport, MapError>
    where
        I: IntoIterator<Item = &'a Claim>,
    {
        let mut report = PairingReport::default();
        for claim in claims {
            let outcome = self.add_pair(&claim.token_a, &claim.token_b)?;
            report.record(&outcome);
        }
        Ok(report)
    }

    /// Validates feed output and merges it. Malformed upstream data aborts the batch.
    pub fn add_raw_pairs(&mut self, claims: Vec<RawClaim>) -> Result<PairingReport, MapError> {
        let validated = claims
            .into_iter()
            .map(|claim| claim.validate(&self.supported))
            .collect::<Result<Vec<_>, _>>()?;
        self.add_pairs(validated.iter())
    }

    /// Runs each source in order; a source sees everything merged before it.
    pub async fn populate_with(&mut self, sources: &[Box<dyn ClaimSource>]) -> Result<PairingReport> {
        let mut total = PairingReport::default();

        if sources.is_empty() {
            info!("No sources to run");
            return Ok(total);
        }

        for source in sources {
            let started = Instant::now();
            info!("{}: Fetching tokens", source.name());
            let claims = source
                .fetch_claims(self)
                .await
                .with_context(|| format!("{} source failed", source.name()))?;

            info!("{}: Adding {} pairs", source.name(), claims.len());
            let report = self
                .add_raw_pairs(claims)
                .with_context(|| format!("{} produced malformed claims", source.name()))?;

            info!(
                "{}: created={} extended={} reused={} conflicts={} rejected={} in {:?}",
                source.name(),
                report.created,
                report.extended,
                report.reused,
                report.conflicts,
                report.rejected,
                started.elapsed()
            );

            total.created += report.created;
            total.extended += report.extended;
            total.reused += report.reused;
            total.conflicts += report.conflicts;
            total.rejected += report.rejected;
        }

        Ok(total)
    }
}
