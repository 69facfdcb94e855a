// Arbitrum token bridge: L2 addresses are derived on-chain from the L1 gateway router,
// L1 addresses are read back from standard L2 tokens.

use super::ClaimSource;
use crate::chains::ChainId;
use crate::crosschain_map::CrosschainMap;
use crate::settings::ArbitrumSource as ArbitrumConfig;
use crate::token::{IndexEntry, RawClaim, RawToken};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::{abigen, Address, Http, Provider};
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::str::FromStr;
use std::sync::Arc;

abigen!(
    L1GatewayRouter,
    r#"[
        function calculateL2TokenAddress(address l1ERC20) external view returns (address)
    ]"#,
    methods {
        calculateL2TokenAddress(address) as calculate_l2_token_address;
    }
);

abigen!(
    L2StandardToken,
    r#"[
        function l1Address() external view returns (address)
    ]"#,
    methods {
        l1Address() as l1_address;
    }
);

pub struct ArbitrumGatewaySource {
    cfg: ArbitrumConfig,
}

impl ArbitrumGatewaySource {
    pub fn new(cfg: ArbitrumConfig) -> Self {
        Self { cfg }
    }

    fn provider(url: &str) -> Result<Arc<Provider<Http>>> {
        let provider = Provider::<Http>::try_from(url).with_context(|| format!("Invalid RPC url {}", url))?;
        Ok(Arc::new(provider))
    }

    async fn l2_addresses(&self, l1_tokens: &[IndexEntry]) -> Result<Vec<RawClaim>> {
        let provider = Self::provider(&self.cfg.mainnet_rpc_url)?;
        let router_address = Address::from_str(&self.cfg.l1_gateway_router).context("Invalid L1 gateway router address")?;
        let router = L1GatewayRouter::new(router_address, provider);

        let results: Vec<Option<RawClaim>> = stream::iter(l1_tokens.to_vec())
            .map(move |entry| {
                let router = router.clone();
                async move {
                    let l1 = parse_address(&entry.address)?;
                    match router.calculate_l2_token_address(l1).call().await {
                        Ok(l2) if !l2.is_zero() => {
                            let token_a = raw_from_entry(&entry, ChainId::MAINNET, &entry.address);
                            let token_b = raw_from_entry(&entry, ChainId::ARBITRUM, &address_to_string(l2));
                            Some(RawClaim::new(token_a, token_b))
                        }
                        Ok(_) => None,
                        Err(e) => {
                            debug!("ARBITRUM: calculateL2TokenAddress({}) failed: {}", entry.address, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.cfg.max_concurrent_calls.max(1))
            .collect()
            .await;

        Ok(results.into_iter().flatten().collect())
    }

    async fn l1_addresses(&self, l2_tokens: &[IndexEntry]) -> Result<Vec<RawClaim>> {
        let provider = Self::provider(&self.cfg.arbitrum_rpc_url)?;

        let results: Vec<Option<RawClaim>> = stream::iter(l2_tokens.to_vec())
            .map(move |entry| {
                let provider = provider.clone();
                async move {
                    let l2 = parse_address(&entry.address)?;
                    // Only standard bridge tokens expose l1Address(); anything else is skipped.
                    match L2StandardToken::new(l2, provider).l1_address().call().await {
                        Ok(l1) if !l1.is_zero() => {
                            let token_a = raw_from_entry(&entry, ChainId::MAINNET, &address_to_string(l1));
                            let token_b = raw_from_entry(&entry, ChainId::ARBITRUM, &entry.address);
                            Some(RawClaim::new(token_a, token_b))
                        }
                        Ok(_) => None,
                        Err(e) => {
                            debug!("ARBITRUM: l1Address() on {} failed: {}", entry.address, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.cfg.max_concurrent_calls.max(1))
            .collect()
            .await;

        Ok(results.into_iter().flatten().collect())
    }
}

fn parse_address(address: &str) -> Option<Address> {
    Address::from_str(address).ok()
}

fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

fn raw_from_entry(entry: &IndexEntry, chain: ChainId, address: &str) -> RawToken {
    RawToken {
        chain_id: chain.as_u64(),
        address: Some(address.to_string()),
        name: entry.name.clone(),
        symbol: entry.symbol.clone(),
        decimals: Some(entry.decimals),
        logo_uri: None,
    }
}

/// Index entries on `chain` whose identity has no address on `missing`.
pub fn unpaired_entries(map: &CrosschainMap, chain: ChainId, missing: ChainId) -> Vec<IndexEntry> {
    let store = map.store();
    store
        .index_for(chain)
        .map(|entries| {
            entries
                .values()
                .filter(|entry| {
                    store
                        .identity(entry.id)
                        .map(|identity| identity.address_on(missing).is_none())
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ClaimSource for ArbitrumGatewaySource {
    fn name(&self) -> &'static str {
        "ARBITRUM"
    }

    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        let supported = map.supported_chains();
        if !supported.contains(ChainId::MAINNET) || !supported.contains(ChainId::ARBITRUM) {
            info!("ARBITRUM: Mainnet or Arbitrum is not supported, skipping");
            return Ok(Vec::new());
        }

        let mut claims = Vec::new();

        let l1_tokens = unpaired_entries(map, ChainId::MAINNET, ChainId::ARBITRUM);
        if l1_tokens.is_empty() {
            info!("ARBITRUM: All L1 tokens are paired with L2");
        } else {
            info!("ARBITRUM: Fetching L2 addresses for {} tokens", l1_tokens.len());
            claims.extend(self.l2_addresses(&l1_tokens).await?);
        }

        let l2_tokens = unpaired_entries(map, ChainId::ARBITRUM, ChainId::MAINNET);
        if l2_tokens.is_empty() {
            info!("ARBITRUM: All L2 tokens are paired with L1");
        } else {
            info!("ARBITRUM: Fetching L1 addresses for {} tokens", l2_tokens.len());
            claims.extend(self.l1_addresses(&l2_tokens).await?);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn test_unpaired_entries() {
        let mut map = CrosschainMap::default();
        map.add_pair(
            &Token::new(ChainId::MAINNET, "0xaa", "USD Coin", "USDC", 6),
            &Token::new(ChainId::ARBITRUM, "0xbb", "USD Coin", "USDC", 6),
        )
        .unwrap();
        map.add_pair(
            &Token::new(ChainId::MAINNET, "0xcc", "Aave", "AAVE", 18),
            &Token::new(ChainId::POLYGON, "0xdd", "Aave", "AAVE", 18),
        )
        .unwrap();

        let l1 = unpaired_entries(&map, ChainId::MAINNET, ChainId::ARBITRUM);
        assert_eq!(l1.len(), 1);
        assert_eq!(l1[0].symbol, "AAVE");
        assert!(unpaired_entries(&map, ChainId::ARBITRUM, ChainId::MAINNET).is_empty());
        assert!(unpaired_entries(&map, ChainId::GNOSIS, ChainId::MAINNET).is_empty());
    }

    #[tokio::test]
    async fn test_skips_when_arbitrum_unsupported() {
        use crate::chains::SupportedChains;

        let map = CrosschainMap::new(SupportedChains::new([ChainId::MAINNET, ChainId::POLYGON]));
        let source = ArbitrumGatewaySource::new(ArbitrumConfig {
            mainnet_rpc_url: "http://127.0.0.1:1".to_string(),
            arbitrum_rpc_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        });
        assert!(source.fetch_claims(&map).await.unwrap().is_empty());
    }

    #[test]
    fn test_address_to_string_is_lowercase_hex() {
        let addr = Address::from_str("0x82aF49447D8a07e3bd95BD0d56f35241523fBab1").unwrap();
        assert_eq!(address_to_string(addr), "0x82af49447d8a07e3bd95bd0d56f35241523fbab1");
    }
}
