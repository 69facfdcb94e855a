// Omnibridge subgraphs: each bridged token row links a home-chain token to its foreign original.

use super::{de_opt_u64, ClaimSource};
use crate::crosschain_map::CrosschainMap;
use crate::http::HttpFetcher;
use crate::settings::OmnibridgeSource as OmnibridgeConfig;
use crate::token::{RawClaim, RawToken};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

// Aliases flip the subgraph's naming so "home" is always the bridged side.
const HOME_TOKENS_QUERY: &str = r#"
  query homeTokens {
    tokens(where: { homeAddress_contains: "0x" }, first: 1000) {
      homeChainId: foreignChainId
      foreignChainId: homeChainId
      homeAddress: foreignAddress
      foreignAddress: homeAddress
      homeName: foreignName
      foreignName: homeName
      symbol
      decimals
    }
  }
"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmnibridgeToken {
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub home_chain_id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub foreign_chain_id: Option<u64>,
    #[serde(default)]
    pub home_address: Option<String>,
    #[serde(default)]
    pub foreign_address: Option<String>,
    #[serde(default)]
    pub home_name: Option<String>,
    #[serde(default)]
    pub foreign_name: Option<String>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub decimals: Option<u64>,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: OmnibridgeList,
}

#[derive(Deserialize)]
struct OmnibridgeList {
    tokens: Vec<OmnibridgeToken>,
}

pub struct OmnibridgeSource {
    fetcher: HttpFetcher,
    cfg: OmnibridgeConfig,
}

impl OmnibridgeSource {
    pub fn new(fetcher: HttpFetcher, cfg: OmnibridgeConfig) -> Self {
        Self { fetcher, cfg }
    }

    async fn fetch_graph(&self, graph_name: &str) -> Result<Vec<OmnibridgeToken>> {
        let url = Url::parse(&self.cfg.subgraph_base_url)
            .and_then(|base| base.join(graph_name))
            .with_context(|| format!("Invalid subgraph url for {}", graph_name))?;
        let response: GraphQlResponse = self
            .fetcher
            .post_json(&url, &GraphQlRequest { query: HOME_TOKENS_QUERY })
            .await
            .with_context(|| format!("Subgraph {} query failed", graph_name))?;
        Ok(response.data.tokens)
    }
}

/// Strips the bridge suffix ("... on xDai", "... from Ethereum") from home-side names.
pub fn clean_home_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let cut = [" on ", " from "]
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min()
        .unwrap_or(name.len());
    name[..cut].trim().replace("USD//C", "USD Coin")
}

pub fn claims_from_tokens(tokens: &[OmnibridgeToken]) -> Vec<RawClaim> {
    let mut claims = Vec::with_capacity(tokens.len());
    let mut broken = 0usize;

    for token in tokens {
        let (home_chain, foreign_chain, home_address, foreign_address, home_name, foreign_name) = match (
            token.home_chain_id,
            token.foreign_chain_id,
            token.home_address.as_deref(),
            token.foreign_address.as_deref(),
            token.home_name.as_deref(),
            token.foreign_name.as_deref(),
        ) {
            (Some(hc), Some(fc), Some(ha), Some(fa), Some(hn), Some(fname))
                if !ha.is_empty() && !fa.is_empty() && !hn.is_empty() && !fname.is_empty() =>
            {
                (hc, fc, ha, fa, hn, fname)
            }
            _ => {
                broken += 1;
                continue;
            }
        };
        let decimals = token.decimals.and_then(|d| u8::try_from(d).ok());

        let home = RawToken {
            chain_id: home_chain,
            address: Some(home_address.to_string()),
            name: clean_home_name(home_name),
            symbol: token.symbol.clone(),
            decimals,
            logo_uri: None,
        };
        let foreign = RawToken {
            chain_id: foreign_chain,
            address: Some(foreign_address.to_string()),
            name: foreign_name.to_string(),
            symbol: token.symbol.clone(),
            decimals,
            logo_uri: None,
        };
        claims.push(RawClaim::new(home, foreign));
    }

    if broken > 0 {
        info!("OMNIBRIDGE: Skipped {} incomplete tokens", broken);
    }

    claims
}

#[async_trait]
impl ClaimSource for OmnibridgeSource {
    fn name(&self) -> &'static str {
        "OMNIBRIDGE"
    }

    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        let pages = try_join_all(self.cfg.home_graph_names.iter().map(|g| self.fetch_graph(g))).await?;
        let tokens: Vec<OmnibridgeToken> = pages.into_iter().flatten().collect();

        // Bridges to chains outside the supported set are dropped here, not at ingestion.
        let supported = map.supported_chains();
        let in_scope: Vec<OmnibridgeToken> = tokens
            .into_iter()
            .filter(|t| {
                let home = t.home_chain_id.map(|c| supported.contains(c.into())).unwrap_or(true);
                let foreign = t.foreign_chain_id.map(|c| supported.contains(c.into())).unwrap_or(true);
                home && foreign
            })
            .collect();

        Ok(claims_from_tokens(&in_scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_home_name() {
        assert_eq!(clean_home_name("Dai Stablecoin on xDai"), "Dai Stablecoin");
        assert_eq!(clean_home_name("Chainlink Token from Ethereum"), "Chainlink Token");
        assert_eq!(clean_home_name("USD//C on BSC"), "USD Coin");
        assert_eq!(clean_home_name("Wrapped Ether"), "Wrapped Ether");
    }

    #[test]
    fn test_claims_from_tokens() {
        let tokens: Vec<OmnibridgeToken> = serde_json::from_str(
            r#"[
                {"homeChainId":"100","foreignChainId":1,"homeAddress":"0xddafbb505ad214d7b80b1f830fccc89b60fb7a83",
                 "foreignAddress":"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48","homeName":"USD//C on xDai",
                 "foreignName":"USD Coin","symbol":"USDC","decimals":"6"},
                {"homeChainId":100,"foreignChainId":1,"homeAddress":null,
                 "foreignAddress":"0x01","homeName":"Broken","foreignName":"Broken","symbol":"BRK","decimals":18}
            ]"#,
        )
        .unwrap();

        let claims = claims_from_tokens(&tokens);
        assert_eq!(claims.len(), 1);
        let claim = &claims[0];
        assert_eq!(claim.token_a.chain_id, 100);
        assert_eq!(claim.token_a.name, "USD Coin");
        assert_eq!(claim.token_a.decimals, Some(6));
        assert_eq!(claim.token_b.chain_id, 1);
    }
}
