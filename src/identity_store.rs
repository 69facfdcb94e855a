// src/identity_store.rs
//
// Asset identities plus the per-chain address index that points back at them.
// The pairing engine is the only writer; both structures change together per claim.

use crate::chains::ChainId;
use crate::token::{normalize_address, AssetIdentity, IdentityId, IndexEntry, Token};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Address index for one chain, keyed by lowercase address.
pub type ChainIndex = IndexMap<String, IndexEntry>;

/// What `extend_identity` will do (or did) to an identity's chain slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendPlan {
    /// Slot was empty; address and decimals are recorded.
    Insert,
    /// Slot already holds this address with these decimals.
    Unchanged,
    /// Same address, decimals updated.
    CorrectDecimals { from: Option<u8> },
    /// Different address with matching decimals; the slot moves to the new address.
    ReplaceAddress { previous: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtendError {
    #[error("CrosschainToken {0} not found")]
    MissingIdentity(IdentityId),
    #[error("Addresses/decimals doesn't match: recorded {recorded_address} ({recorded_decimals:?} decimals)")]
    Conflict {
        recorded_address: String,
        recorded_decimals: Option<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexWarning {
    #[error("Token already added")]
    AlreadyIndexed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityStore {
    #[serde(rename = "crosschainMap")]
    identities: IndexMap<IdentityId, AssetIdentity>,
    #[serde(rename = "tokenMapByChain")]
    index: BTreeMap<ChainId, ChainIndex>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_identity_id(&self, chain: ChainId, address: &str) -> Option<IdentityId> {
        self.index
            .get(&chain)
            .and_then(|entries| entries.get(&normalize_address(address)))
            .map(|entry| entry.id)
    }

    pub fn lookup_identity(&self, chain: ChainId, address: &str) -> Option<&AssetIdentity> {
        self.lookup_identity_id(chain, address)
            .and_then(|id| self.identities.get(&id))
    }

    pub fn lookup_entry(&self, chain: ChainId, address: &str) -> Option<&IndexEntry> {
        self.index
            .get(&chain)
            .and_then(|entries| entries.get(&normalize_address(address)))
    }

    /// First index entry on `chain` whose symbol matches, ignoring case.
    pub fn lookup_by_symbol(&self, chain: ChainId, symbol: &str) -> Option<&IndexEntry> {
        self.index
            .get(&chain)?
            .values()
            .find(|entry| entry.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn identity(&self, id: IdentityId) -> Option<&AssetIdentity> {
        self.identities.get(&id)
    }

    /// Identities in creation order.
    pub fn identities(&self) -> impl Iterator<Item = &AssetIdentity> + '_ {
        self.identities.values()
    }

    pub fn identity_map(&self) -> &IndexMap<IdentityId, AssetIdentity> {
        &self.identities
    }

    pub fn index(&self) -> &BTreeMap<ChainId, ChainIndex> {
        &self.index
    }

    pub fn index_for(&self, chain: ChainId) -> Option<&ChainIndex> {
        self.index.get(&chain)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Allocates a fresh identity seeded from `token`. Indexing is left to the caller.
    pub fn create_identity(&mut self, token: &Token) -> IdentityId {
        let id = IdentityId::generate();
        self.identities.insert(id, AssetIdentity::seed(id, token));
        id
    }

    /// Decides how `token` would merge into identity `id` without touching the store.
    pub fn check_extend(&self, id: IdentityId, token: &Token) -> Result<ExtendPlan, ExtendError> {
        let identity = self
            .identities
            .get(&id)
            .ok_or(ExtendError::MissingIdentity(id))?;
        let address = token.normalized_address();
        let recorded_decimals = identity.decimals_on(token.chain);

        let plan = match identity.addresses.get(&token.chain) {
            None => ExtendPlan::Insert,
            Some(recorded) if *recorded == address => {
                if recorded_decimals == Some(token.decimals) {
                    ExtendPlan::Unchanged
                } else {
                    ExtendPlan::CorrectDecimals {
                        from: recorded_decimals,
                    }
                }
            }
            Some(recorded) => {
                if recorded_decimals != Some(token.decimals) {
                    return Err(ExtendError::Conflict {
                        recorded_address: recorded.clone(),
                        recorded_decimals,
                    });
                }
                ExtendPlan::ReplaceAddress {
                    previous: recorded.clone(),
                }
            }
        };

        Ok(plan)
    }

    /// Merges `token`'s chain slot into identity `id`. On error nothing is changed.
    pub fn extend_identity(
        &mut self,
        id: IdentityId,
        token: &Token,
    ) -> Result<ExtendPlan, ExtendError> {
        let plan = self.check_extend(id, token)?;
        let address = token.normalized_address();

        if let ExtendPlan::ReplaceAddress { previous } = &plan {
            if let Some(entries) = self.index.get_mut(&token.chain) {
                if entries.get(previous).map(|e| e.id) == Some(id) {
                    entries.shift_remove(previous);
                }
            }
        }
        if let ExtendPlan::CorrectDecimals { .. } = &plan {
            if let Some(entry) = self
                .index
                .get_mut(&token.chain)
                .and_then(|entries| entries.get_mut(&address))
            {
                entry.decimals = token.decimals;
            }
        }

        let identity = self
            .identities
            .get_mut(&id)
            .ok_or(ExtendError::MissingIdentity(id))?;
        if plan != ExtendPlan::Unchanged {
            identity.addresses.insert(token.chain, address);
            identity.decimals.insert(token.chain, token.decimals);
        }
        if let Some(logo) = &token.logo_uri {
            identity.logo_uri = Some(logo.clone());
        }

        Ok(plan)
    }

    /// Writes the index entry for `token`. Re-indexing the same address to the same id
    /// is a no-op reported as `IndexWarning::AlreadyIndexed`.
    pub fn index_token(&mut self, id: IdentityId, token: &Token) -> Result<(), IndexWarning> {
        let entries = self.index.entry(token.chain).or_default();
        let address = token.normalized_address();

        if entries.get(&address).map(|e| e.id) == Some(id) {
            return Err(IndexWarning::AlreadyIndexed);
        }

        entries.insert(address, IndexEntry::from_token(id, token));
        Ok(())
    }

    /// Verifies that every index entry points at an identity holding that exact slot.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (chain, entries) in &self.index {
            for (address, entry) in entries {
                if *address != entry.address || entry.chain != *chain {
                    return Err(format!(
                        "index key {}:{} disagrees with entry {}:{}",
                        chain, address, entry.chain, entry.address
                    ));
                }
                let identity = self
                    .identities
                    .get(&entry.id)
                    .ok_or_else(|| format!("index entry {}:{} points at missing {}", chain, address, entry.id))?;
                if identity.address_on(*chain) != Some(address.as_str()) {
                    return Err(format!(
                        "identity {} records {:?} on chain {}, index has {}",
                        entry.id,
                        identity.address_on(*chain),
                        chain,
                        address
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc(chain: ChainId, address: &str, decimals: u8) -> Token {
        Token::new(chain, address, "USD Coin", "USDC", decimals)
    }

    #[test]
    fn test_create_and_index() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::MAINNET, "0xAbC", 6);
        let id = store.create_identity(&token);
        assert!(store.lookup_identity_id(ChainId::MAINNET, "0xabc").is_none());

        store.index_token(id, &token).unwrap();
        assert_eq!(store.lookup_identity_id(ChainId::MAINNET, "0xABC"), Some(id));
        assert_eq!(
            store.lookup_identity(ChainId::MAINNET, "0xabc").unwrap().address_on(ChainId::MAINNET),
            Some("0xabc")
        );
        assert_eq!(store.index_token(id, &token), Err(IndexWarning::AlreadyIndexed));
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_distinct_ids() {
        let mut store = IdentityStore::new();
        let a = store.create_identity(&usdc(ChainId::MAINNET, "0x1", 6));
        let b = store.create_identity(&usdc(ChainId::MAINNET, "0x2", 6));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_extend_plans() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::MAINNET, "0xaa", 6);
        let id = store.create_identity(&token);
        store.index_token(id, &token).unwrap();

        assert_eq!(store.check_extend(id, &usdc(ChainId::POLYGON, "0xbb", 6)), Ok(ExtendPlan::Insert));
        assert_eq!(store.check_extend(id, &usdc(ChainId::MAINNET, "0xAA", 6)), Ok(ExtendPlan::Unchanged));
        assert_eq!(
            store.check_extend(id, &usdc(ChainId::MAINNET, "0xaa", 18)),
            Ok(ExtendPlan::CorrectDecimals { from: Some(6) })
        );
        assert_eq!(
            store.check_extend(id, &usdc(ChainId::MAINNET, "0xcc", 6)),
            Ok(ExtendPlan::ReplaceAddress { previous: "0xaa".to_string() })
        );
        assert!(matches!(
            store.check_extend(id, &usdc(ChainId::MAINNET, "0xcc", 18)),
            Err(ExtendError::Conflict { .. })
        ));
    }

    #[test]
    fn test_extend_conflict_leaves_store_untouched() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::MAINNET, "0xaa", 6);
        let id = store.create_identity(&token);
        store.index_token(id, &token).unwrap();

        let err = store.extend_identity(id, &usdc(ChainId::MAINNET, "0xbb", 18));
        assert!(err.is_err());
        let identity = store.identity(id).unwrap();
        assert_eq!(identity.address_on(ChainId::MAINNET), Some("0xaa"));
        assert_eq!(identity.decimals_on(ChainId::MAINNET), Some(6));
    }

    #[test]
    fn test_extend_missing_identity() {
        let mut store = IdentityStore::new();
        let ghost = IdentityId::generate();
        assert_eq!(
            store.extend_identity(ghost, &usdc(ChainId::MAINNET, "0xaa", 6)),
            Err(ExtendError::MissingIdentity(ghost))
        );
    }

    #[test]
    fn test_replace_address_evicts_stale_index_entry() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::MAINNET, "0xaa", 6);
        let id = store.create_identity(&token);
        store.index_token(id, &token).unwrap();

        let replacement = usdc(ChainId::MAINNET, "0xcc", 6);
        store.extend_identity(id, &replacement).unwrap();
        store.index_token(id, &replacement).unwrap();

        assert!(store.lookup_identity_id(ChainId::MAINNET, "0xaa").is_none());
        assert_eq!(store.lookup_identity_id(ChainId::MAINNET, "0xcc"), Some(id));
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_decimals_correction_refreshes_index_snapshot() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::GNOSIS, "0xaa", 18);
        let id = store.create_identity(&token);
        store.index_token(id, &token).unwrap();

        store.extend_identity(id, &usdc(ChainId::GNOSIS, "0xAA", 6)).unwrap();
        assert_eq!(store.identity(id).unwrap().decimals_on(ChainId::GNOSIS), Some(6));
        assert_eq!(store.lookup_entry(ChainId::GNOSIS, "0xaa").unwrap().decimals, 6);
    }

    #[test]
    fn test_logo_last_write_wins() {
        let mut store = IdentityStore::new();
        let id = store.create_identity(&usdc(ChainId::MAINNET, "0xaa", 6).with_logo("first"));
        store
            .extend_identity(id, &usdc(ChainId::POLYGON, "0xbb", 6).with_logo("second"))
            .unwrap();
        store.extend_identity(id, &usdc(ChainId::GNOSIS, "0xcc", 6)).unwrap();
        assert_eq!(store.identity(id).unwrap().logo_uri.as_deref(), Some("second"));
    }

    #[test]
    fn test_lookup_by_symbol() {
        let mut store = IdentityStore::new();
        let token = usdc(ChainId::MAINNET, "0xaa", 6);
        let id = store.create_identity(&token);
        store.index_token(id, &token).unwrap();

        assert_eq!(store.lookup_by_symbol(ChainId::MAINNET, "usdc").unwrap().id, id);
        assert!(store.lookup_by_symbol(ChainId::POLYGON, "USDC").is_none());
    }
}
