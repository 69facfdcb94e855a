// Socket (Bungee) token lists: per-route availability for the derived lists, and a
// symbol-matched claim feed built from the same endpoints.

use super::{ClaimSource, DirectionalLists, ListedToken, TokenAvailabilitySource};
use crate::chains::{chain_pairs, ChainId};
use crate::crosschain_map::CrosschainMap;
use crate::http::HttpFetcher;
use crate::settings::Socket as SocketConfig;
use crate::token::{RawClaim, RawToken};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

const FROM_TOKEN_LIST: &str = "token-lists/from-token-list";
const TO_TOKEN_LIST: &str = "token-lists/to-token-list";
const ROUTE_CONCURRENCY: usize = 4;

#[derive(Debug, Deserialize)]
struct SocketResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Vec<ListedToken>,
}

#[derive(Clone)]
pub struct SocketClient {
    fetcher: HttpFetcher,
    base_url: Url,
    api_key: String,
    single_tx_only: bool,
}

impl SocketClient {
    pub fn new(fetcher: HttpFetcher, cfg: &SocketConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url).context("Invalid socket base url")?;
        Ok(Self {
            fetcher,
            base_url,
            api_key: cfg.api_key.clone(),
            single_tx_only: cfg.single_tx_only,
        })
    }

    fn endpoint(&self, path: &str, from: ChainId, to: ChainId, short_list: bool) -> Result<Url> {
        let mut url = self.base_url.join(path).context("Invalid socket endpoint")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fromChainId", &from.to_string());
            query.append_pair("toChainId", &to.to_string());
            query.append_pair("singleTxOnly", if self.single_tx_only { "true" } else { "false" });
            if short_list {
                query.append_pair("isShortList", "true");
            }
        }
        Ok(url)
    }

    async fn fetch_list(&self, path: &str, from: ChainId, to: ChainId, short_list: bool) -> Result<Vec<ListedToken>> {
        let url = self.endpoint(path, from, to, short_list)?;
        let response: SocketResponse = self
            .fetcher
            .get_json(&url, &[("API-KEY", self.api_key.as_str())])
            .await?;
        if !response.success {
            return Err(anyhow!("Socket {} {}->{} returned success=false", path, from, to));
        }
        debug!("SOCKET: {} {}->{} returned {} tokens", path, from, to, response.result.len());
        Ok(response.result)
    }
}

#[async_trait]
impl TokenAvailabilitySource for SocketClient {
    async fn token_lists(&self, from: ChainId, to: ChainId, short_list: bool) -> Result<DirectionalLists> {
        let (from_list, to_list) = tokio::try_join!(
            self.fetch_list(FROM_TOKEN_LIST, from, to, short_list),
            self.fetch_list(TO_TOKEN_LIST, from, to, short_list)
        )
        .with_context(|| format!("Socket token lists {}->{} failed", from, to))?;

        Ok(DirectionalLists {
            from: from_list,
            to: to_list,
        })
    }
}

/// Pairs every token on the `to` side with the `from` token carrying the same symbol.
/// Token A is the destination side.
pub fn symbol_pairs(lists: &DirectionalLists) -> Vec<RawClaim> {
    if lists.from.is_empty() {
        return Vec::new();
    }

    lists
        .to
        .iter()
        .filter_map(|to_token| {
            lists
                .from
                .iter()
                .find(|from_token| from_token.symbol == to_token.symbol)
                .map(|from_token| RawClaim::new(RawToken::from(to_token), RawToken::from(from_token)))
        })
        .collect()
}

/// Keeps the A→B pairs whose symbol is also paired in the B→A direction.
pub fn bidirectional_pairs(ab: Vec<RawClaim>, ba: &[RawClaim]) -> Vec<RawClaim> {
    let reverse: HashSet<&str> = ba.iter().map(|claim| claim.token_b.symbol.as_str()).collect();
    let forward: HashSet<&str> = ba.iter().map(|claim| claim.token_a.symbol.as_str()).collect();

    ab.into_iter()
        .filter(|claim| reverse.contains(claim.token_a.symbol.as_str()) && forward.contains(claim.token_b.symbol.as_str()))
        .collect()
}

/// Claim feed over Socket's lists. Matching is by symbol only, so it runs last and
/// is disabled by default.
pub struct SocketPairSource<S = SocketClient> {
    lists: S,
}

impl<S: TokenAvailabilitySource> SocketPairSource<S> {
    pub fn new(lists: S) -> Self {
        Self { lists }
    }

    async fn route_pairs(&self, chain_a: ChainId, chain_b: ChainId) -> Result<Vec<RawClaim>> {
        let ab = self.lists.token_lists(chain_a, chain_b, false).await?;
        let ba = self.lists.token_lists(chain_b, chain_a, false).await?;
        Ok(bidirectional_pairs(symbol_pairs(&ab), &symbol_pairs(&ba)))
    }
}

#[async_trait]
impl<S: TokenAvailabilitySource> ClaimSource for SocketPairSource<S> {
    fn name(&self) -> &'static str {
        "SOCKET_TOKENS"
    }

    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        let chains: Vec<ChainId> = map.supported_chains().iter().collect();
        let routes = chain_pairs(&chains);
        info!("SOCKET_TOKENS: Fetching {} routes", routes.len());

        let results: Vec<Vec<RawClaim>> = stream::iter(routes)
            .map(|(a, b)| async move {
                match self.route_pairs(a, b).await {
                    Ok(claims) => claims,
                    Err(e) => {
                        // Socket doesn't serve every supported chain (testnets)
                        warn!("SOCKET_TOKENS: Skipping route {}-{}: {:#}", a, b, e);
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(ROUTE_CONCURRENCY)
            .collect()
            .await;

        Ok(results.into_iter().flatten().collect())
    }
}
