// Optimism token list: tokens sharing a symbol across L1 and Optimism are the same asset.

use super::ClaimSource;
use crate::chains::ChainId;
use crate::crosschain_map::CrosschainMap;
use crate::http::HttpFetcher;
use crate::settings::OptimismSource as OptimismConfig;
use crate::token::{RawClaim, RawToken};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub decimals: Option<u8>,
    pub symbol: String,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenList {
    pub tokens: Vec<TokenInfo>,
}

pub struct OptimismListSource {
    fetcher: HttpFetcher,
    cfg: OptimismConfig,
}

impl OptimismListSource {
    pub fn new(fetcher: HttpFetcher, cfg: OptimismConfig) -> Self {
        Self { fetcher, cfg }
    }
}

fn to_raw(token: &TokenInfo) -> RawToken {
    RawToken {
        chain_id: token.chain_id,
        address: Some(token.address.clone()),
        name: token.name.clone(),
        symbol: token.symbol.clone(),
        decimals: token.decimals,
        logo_uri: token.logo_uri.clone(),
    }
}

/// For every supported chain other than Optimism, pairs each symbol's L1 entry with its
/// Optimism entry. When the list only carries the Optimism side, the L1 side is taken
/// from whatever the map already holds for that symbol.
pub fn claims_from_list(list: &TokenList, map: &CrosschainMap) -> Vec<RawClaim> {
    let mut by_symbol: BTreeMap<&str, Vec<&TokenInfo>> = BTreeMap::new();
    for token in &list.tokens {
        by_symbol.entry(token.symbol.as_str()).or_default().push(token);
    }

    let optimism = ChainId::OPTIMISM.as_u64();
    let mut claims = Vec::new();

    for chain in map.supported_chains().iter().filter(|c| *c != ChainId::OPTIMISM) {
        for (symbol, tokens) in &by_symbol {
            let Some(l2) = tokens.iter().find(|t| t.chain_id == optimism) else {
                continue;
            };

            let l1 = match tokens.iter().find(|t| t.chain_id == chain.as_u64()) {
                Some(l1) => to_raw(l1),
                None => match map.store().lookup_by_symbol(chain, symbol) {
                    Some(entry) => RawToken {
                        chain_id: chain.as_u64(),
                        address: Some(entry.address.clone()),
                        name: entry.name.clone(),
                        symbol: entry.symbol.clone(),
                        decimals: Some(entry.decimals),
                        logo_uri: None,
                    },
                    None => continue,
                },
            };

            let l2 = RawToken {
                chain_id: optimism,
                address: Some(l2.address.clone()),
                decimals: l2.decimals.or(l1.decimals),
                logo_uri: l2.logo_uri.clone().or_else(|| l1.logo_uri.clone()),
                ..l1.clone()
            };
            claims.push(RawClaim::new(l1, l2));
        }
    }

    claims
}

#[async_trait]
impl ClaimSource for OptimismListSource {
    fn name(&self) -> &'static str {
        "OPTIMISM"
    }

    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        let url = Url::parse(&self.cfg.token_list_url).context("Invalid optimism token list url")?;
        let list: TokenList = self.fetcher.get_json(&url, &[]).await?;
        Ok(claims_from_list(&list, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::SupportedChains;
    use crate::token::Token;

    fn info(chain_id: u64, address: &str, symbol: &str) -> TokenInfo {
        TokenInfo {
            chain_id,
            address: address.to_string(),
            name: format!("{} token", symbol),
            decimals: Some(18),
            symbol: symbol.to_string(),
            logo_uri: None,
        }
    }

    #[test]
    fn test_pairs_l1_and_l2_entries() {
        let map = CrosschainMap::new(SupportedChains::new([ChainId::MAINNET, ChainId::OPTIMISM]));
        let list = TokenList {
            tokens: vec![
                info(1, "0x6b175474e89094c44da98b954eedeac495271d0f", "DAI"),
                info(10, "0xda10009cbd5d07dd0cecc66161fc93d7c9000da1", "DAI"),
                info(1, "0x01", "L1ONLY"),
            ],
        };

        let claims = claims_from_list(&list, &map);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].token_a.chain_id, 1);
        assert_eq!(claims[0].token_b.chain_id, 10);
        assert_eq!(claims[0].token_b.address.as_deref(), Some("0xda10009cbd5d07dd0cecc66161fc93d7c9000da1"));
    }

    #[test]
    fn test_falls_back_to_mapped_symbol() {
        let mut map = CrosschainMap::new(SupportedChains::new([ChainId::MAINNET, ChainId::POLYGON, ChainId::OPTIMISM]));
        map.add_pair(
            &Token::new(ChainId::MAINNET, "0xaa", "Synthetix", "SNX", 18),
            &Token::new(ChainId::POLYGON, "0xbb", "Synthetix", "SNX", 18),
        )
        .unwrap();

        let list = TokenList { tokens: vec![info(10, "0xcc", "SNX")] };
        let claims = claims_from_list(&list, &map);

        // one claim for mainnet, one for polygon
        assert_eq!(claims.len(), 2);
        assert!(claims.iter().all(|c| c.token_b.address.as_deref() == Some("0xcc")));
        assert!(claims.iter().any(|c| c.token_a.address.as_deref() == Some("0xaa")));
    }
}
