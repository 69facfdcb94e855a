// Polygon PoS token mapper: every POS mapping is a mainnet (root) / polygon (child) pair.

use super::{remove_ignore_case, ClaimSource};
use crate::chains::ChainId;
use crate::crosschain_map::CrosschainMap;
use crate::http::HttpFetcher;
use crate::settings::PolygonSource;
use crate::token::{RawClaim, RawToken};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use url::Url;

pub const WETH_MAINNET: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
pub const WETH_POLYGON: &str = "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619";

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonToken {
    #[serde(default)]
    pub name: Option<String>,
    pub root_token: String,
    pub child_token: String,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
struct MapperPage {
    has_next_page: bool,
    mapping: Vec<PolygonToken>,
}

#[derive(Debug, Deserialize)]
struct MapperResponse {
    data: MapperPage,
}

pub struct PolygonMapperSource {
    fetcher: HttpFetcher,
    cfg: PolygonSource,
}

impl PolygonMapperSource {
    pub fn new(fetcher: HttpFetcher, cfg: PolygonSource) -> Self {
        Self { fetcher, cfg }
    }

    fn page_url(&self, offset: usize) -> Result<Url> {
        Url::parse_with_params(
            &self.cfg.mapper_url,
            &[
                ("map_type", "[\"POS\"]".to_string()),
                ("chain_id", "137".to_string()),
                ("limit", self.cfg.page_size.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .context("Invalid polygon mapper url")
    }

    async fn fetch_tokens(&self) -> Result<Vec<PolygonToken>> {
        let mut tokens = Vec::new();
        let mut offset = 0;

        loop {
            let page: MapperResponse = self.fetcher.get_json(&self.page_url(offset)?, &[]).await?;
            debug!("POLYGON: offset {} returned {} mappings", offset, page.data.mapping.len());
            tokens.extend(page.data.mapping);
            offset += self.cfg.page_size;
            if !page.data.has_next_page {
                break;
            }
        }

        Ok(tokens)
    }
}

/// Pairs root/child tokens, skipping nameless rows and the ignored root tokens, and
/// appends the WETH pair the mapper lists under a broken address.
pub fn claims_from_mapping(tokens: &[PolygonToken], ignored_root_tokens: &[String]) -> Vec<RawClaim> {
    let mut claims = Vec::with_capacity(tokens.len() + 1);
    let mut skipped = 0usize;

    for token in tokens {
        let name = match token.name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => {
                skipped += 1;
                continue;
            }
        };
        if ignored_root_tokens
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(&token.root_token))
        {
            skipped += 1;
            continue;
        }

        let name = remove_ignore_case(name, " (POS)");
        let root = RawToken {
            chain_id: ChainId::MAINNET.as_u64(),
            address: Some(token.root_token.clone()),
            name: name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            logo_uri: None,
        };
        let child = RawToken {
            chain_id: ChainId::POLYGON.as_u64(),
            address: Some(token.child_token.clone()),
            ..root.clone()
        };
        claims.push(RawClaim::new(root, child));
    }

    if skipped > 0 {
        info!("POLYGON: Skipped {} broken mappings", skipped);
    }

    let weth_mainnet = RawToken {
        chain_id: ChainId::MAINNET.as_u64(),
        address: Some(WETH_MAINNET.to_string()),
        name: "Wrapped Ether".to_string(),
        symbol: "WETH".to_string(),
        decimals: Some(18),
        logo_uri: None,
    };
    let weth_polygon = RawToken {
        chain_id: ChainId::POLYGON.as_u64(),
        address: Some(WETH_POLYGON.to_string()),
        ..weth_mainnet.clone()
    };
    claims.push(RawClaim::new(weth_mainnet, weth_polygon));

    claims
}

#[async_trait]
impl ClaimSource for PolygonMapperSource {
    fn name(&self) -> &'static str {
        "POLYGON"
    }

    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        let supported = map.supported_chains();
        if !supported.contains(ChainId::MAINNET) || !supported.contains(ChainId::POLYGON) {
            info!("POLYGON: Mainnet or Polygon is not supported, skipping");
            return Ok(Vec::new());
        }

        let tokens = self.fetch_tokens().await?;
        Ok(claims_from_mapping(&tokens, &self.cfg.ignored_root_tokens))
    }
}
