// src/chains.rs
//
// Chain identifiers and the validated set of chains the map is allowed to index.

use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Numeric network id (EIP-155 chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);
    pub const RINKEBY: ChainId = ChainId(4);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const BSC: ChainId = ChainId(56);
    pub const GNOSIS: ChainId = ChainId(100);
    pub const POLYGON: ChainId = ChainId(137);
    pub const ARBITRUM: ChainId = ChainId(42161);
    pub const ARBITRUM_RINKEBY: ChainId = ChainId(421611);

    /// Every chain the crate ships defaults for.
    pub const KNOWN: [ChainId; 8] = [
        ChainId::MAINNET,
        ChainId::RINKEBY,
        ChainId::OPTIMISM,
        ChainId::BSC,
        ChainId::GNOSIS,
        ChainId::POLYGON,
        ChainId::ARBITRUM,
        ChainId::ARBITRUM_RINKEBY,
    ];

    /// Chains the production token lists are built for.
    pub const PRODUCTION: [ChainId; 5] = [
        ChainId::MAINNET,
        ChainId::ARBITRUM,
        ChainId::GNOSIS,
        ChainId::POLYGON,
        ChainId::OPTIMISM,
    ];

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Human label for logs; unknown chains print their numeric id.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "mainnet",
            4 => "rinkeby",
            10 => "optimism",
            56 => "bsc",
            100 => "gnosis",
            137 => "polygon",
            42161 => "arbitrum",
            421611 => "arbitrum-rinkeby",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        ChainId(value)
    }
}

impl FromStr for ChainId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ChainId)
    }
}

/// The set of chains claims may reference. Anything outside it fails fast at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedChains {
    chains: BTreeSet<ChainId>,
}

impl SupportedChains {
    pub fn new<I: IntoIterator<Item = ChainId>>(chains: I) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }

    pub fn contains(&self, chain: ChainId) -> bool {
        self.chains.contains(&chain)
    }

    /// Returns the chain back if supported, `MapError::UnsupportedChain` otherwise.
    pub fn validate(&self, chain: ChainId) -> Result<ChainId, MapError> {
        if self.contains(chain) {
            Ok(chain)
        } else {
            Err(MapError::UnsupportedChain(chain.0))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.chains.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for SupportedChains {
    fn default() -> Self {
        Self::new(ChainId::KNOWN)
    }
}

/// All unordered pairs `(a, b)` with `a` before `b` in input order.
pub fn chain_pairs(chains: &[ChainId]) -> Vec<(ChainId, ChainId)> {
    let mut pairs = Vec::new();
    for (i, a) in chains.iter().enumerate() {
        for b in &chains[i + 1..] {
            pairs.push((*a, *b));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_contains_known_chains() {
        let supported = SupportedChains::default();
        for chain in ChainId::KNOWN {
            assert!(supported.contains(chain));
        }
        assert!(!supported.contains(ChainId(250)));
    }

    #[test]
    fn test_validate_rejects_unknown_chain() {
        let supported = SupportedChains::new([ChainId::MAINNET, ChainId::POLYGON]);
        assert_eq!(supported.validate(ChainId::POLYGON).unwrap(), ChainId::POLYGON);
        match supported.validate(ChainId::GNOSIS) {
            Err(MapError::UnsupportedChain(100)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_chain_pairs() {
        let pairs = chain_pairs(&[ChainId::MAINNET, ChainId::ARBITRUM, ChainId::GNOSIS]);
        assert_eq!(
            pairs,
            vec![
                (ChainId::MAINNET, ChainId::ARBITRUM),
                (ChainId::MAINNET, ChainId::GNOSIS),
                (ChainId::ARBITRUM, ChainId::GNOSIS),
            ]
        );
        assert!(chain_pairs(&[ChainId::MAINNET]).is_empty());
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(" 137 ".parse::<ChainId>().unwrap(), ChainId::POLYGON);
        assert!("polygon".parse::<ChainId>().is_err());
    }
}
