// src/token.rs
//
// Per-chain token records, the validated claim form, and the cross-chain identity they merge into.

use crate::chains::{ChainId, SupportedChains};
use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical lookup key for an address: trimmed and lowercased.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Opaque identity id. Uniqueness comes from v4 generation, never from a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(uuid::Uuid);

impl IdentityId {
    pub fn generate() -> Self {
        IdentityId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token on one chain, as asserted by a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "chainId")]
    pub chain: ChainId,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl Token {
    pub fn new(
        chain: ChainId,
        address: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            chain,
            address: address.into(),
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            logo_uri: None,
        }
    }

    pub fn with_logo(mut self, logo_uri: impl Into<String>) -> Self {
        self.logo_uri = Some(logo_uri.into());
        self
    }

    /// Same token moved to another chain/address, metadata kept.
    pub fn on_chain(&self, chain: ChainId, address: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
            ..self.clone()
        }
    }

    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }

    /// Validates an ingest record against the supported chain set.
    pub fn try_from_raw(raw: RawToken, supported: &SupportedChains) -> Result<Self, MapError> {
        let chain = supported.validate(ChainId(raw.chain_id))?;
        let address = match raw.address {
            Some(a) if !a.trim().is_empty() => a,
            _ => return Err(MapError::MissingAddress { chain }),
        };
        let decimals = raw.decimals.ok_or_else(|| MapError::MissingDecimals {
            chain,
            address: normalize_address(&address),
        })?;

        Ok(Self {
            chain,
            address,
            name: raw.name,
            symbol: raw.symbol,
            decimals,
            logo_uri: raw.logo_uri,
        })
    }
}

/// Unvalidated token as produced by source feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToken {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: Option<String>,
}

impl From<Token> for RawToken {
    fn from(token: Token) -> Self {
        Self {
            chain_id: token.chain.0,
            address: Some(token.address),
            name: token.name,
            symbol: token.symbol,
            decimals: Some(token.decimals),
            logo_uri: token.logo_uri,
        }
    }
}

/// Assertion that two per-chain tokens are the same asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "tokenA")]
    pub token_a: Token,
    #[serde(rename = "tokenB")]
    pub token_b: Token,
}

impl Claim {
    pub fn new(token_a: Token, token_b: Token) -> Self {
        Self { token_a, token_b }
    }
}

/// Claim as emitted by a feed, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClaim {
    #[serde(rename = "tokenA")]
    pub token_a: RawToken,
    #[serde(rename = "tokenB")]
    pub token_b: RawToken,
}

impl RawClaim {
    pub fn new(token_a: RawToken, token_b: RawToken) -> Self {
        Self { token_a, token_b }
    }

    pub fn validate(self, supported: &SupportedChains) -> Result<Claim, MapError> {
        Ok(Claim {
            token_a: Token::try_from_raw(self.token_a, supported)?,
            token_b: Token::try_from_raw(self.token_b, supported)?,
        })
    }
}

impl From<Claim> for RawClaim {
    fn from(claim: Claim) -> Self {
        Self {
            token_a: claim.token_a.into(),
            token_b: claim.token_b.into(),
        }
    }
}

/// Snapshot stored in the per-chain address index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: IdentityId,
    #[serde(rename = "chainId")]
    pub chain: ChainId,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl IndexEntry {
    pub fn from_token(id: IdentityId, token: &Token) -> Self {
        Self {
            id,
            chain: token.chain,
            address: token.normalized_address(),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
        }
    }
}

/// One logical asset spanning several chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub id: IdentityId,
    pub name: String,
    pub symbol: String,
    pub decimals: BTreeMap<ChainId, u8>,
    pub addresses: BTreeMap<ChainId, String>,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl AssetIdentity {
    /// Seeds a new identity with the token's metadata and its single chain slot.
    pub fn seed(id: IdentityId, token: &Token) -> Self {
        let mut decimals = BTreeMap::new();
        decimals.insert(token.chain, token.decimals);
        let mut addresses = BTreeMap::new();
        addresses.insert(token.chain, token.normalized_address());

        Self {
            id,
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals,
            addresses,
            logo_uri: token.logo_uri.clone(),
        }
    }

    pub fn address_on(&self, chain: ChainId) -> Option<&str> {
        self.addresses.get(&chain).map(String::as_str)
    }

    pub fn decimals_on(&self, chain: ChainId) -> Option<u8> {
        self.decimals.get(&chain).copied()
    }

    pub fn chain_count(&self) -> usize {
        self.addresses.len()
    }

    /// Materializes the per-chain token, if the identity has a slot there.
    pub fn token_on(&self, chain: ChainId) -> Option<Token> {
        let address = self.addresses.get(&chain)?;
        let decimals = self.decimals.get(&chain)?;
        Some(Token {
            chain,
            address: address.clone(),
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: *decimals,
            logo_uri: self.logo_uri.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_raw_validates() {
        let supported = SupportedChains::default();
        let raw = RawToken {
            chain_id: 1,
            address: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()),
            name: "USD Coin".to_string(),
            symbol: "USDC".to_string(),
            decimals: Some(6),
            logo_uri: None,
        };
        let token = Token::try_from_raw(raw.clone(), &supported).unwrap();
        assert_eq!(token.chain, ChainId::MAINNET);
        assert_eq!(token.decimals, 6);

        let unsupported = RawToken { chain_id: 250, ..raw.clone() };
        assert!(matches!(
            Token::try_from_raw(unsupported, &supported),
            Err(MapError::UnsupportedChain(250))
        ));

        let no_decimals = RawToken { decimals: None, ..raw.clone() };
        assert!(matches!(
            Token::try_from_raw(no_decimals, &supported),
            Err(MapError::MissingDecimals { .. })
        ));

        let no_address = RawToken { address: Some("  ".to_string()), ..raw };
        assert!(matches!(
            Token::try_from_raw(no_address, &supported),
            Err(MapError::MissingAddress { .. })
        ));
    }

    #[test]
    fn test_token_serializes_with_list_field_names() {
        let token = Token::new(ChainId::POLYGON, "0xbb", "USD Coin", "USDC", 6).with_logo("ipfs://usdc");
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["chainId"], 137);
        assert_eq!(value["logoURI"], "ipfs://usdc");

        let plain = Token::new(ChainId::POLYGON, "0xbb", "USD Coin", "USDC", 6);
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("logoURI").is_none());
    }

    #[test]
    fn test_identity_token_on() {
        let token = Token::new(ChainId::MAINNET, "0xAA", "USD Coin", "USDC", 6);
        let identity = AssetIdentity::seed(IdentityId::generate(), &token);
        let materialized = identity.token_on(ChainId::MAINNET).unwrap();
        assert_eq!(materialized.address, "0xaa");
        assert!(identity.token_on(ChainId::POLYGON).is_none());
    }
}
