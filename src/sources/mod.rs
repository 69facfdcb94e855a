//! Source feeds.
//!
//! Every feed is a producer of raw same-asset claims. Feeds may fetch concurrently,
//! but they only read the map; merging happens afterwards in `CrosschainMap`.

use crate::chains::ChainId;
use crate::crosschain_map::CrosschainMap;
use crate::http::HttpFetcher;
use crate::settings::Settings;
use crate::token::{RawClaim, RawToken};
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Deserializer, Serialize};

pub mod arbitrum;
pub mod omnibridge;
pub mod optimism;
pub mod polygon;
pub mod socket;

pub use arbitrum::ArbitrumGatewaySource;
pub use omnibridge::OmnibridgeSource;
pub use optimism::OptimismListSource;
pub use polygon::PolygonMapperSource;
pub use socket::{SocketClient, SocketPairSource};

/// Producer of `(tokenA, tokenB)` claims.
#[async_trait]
pub trait ClaimSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches claims. `map` holds everything merged by earlier sources.
    async fn fetch_claims(&self, map: &CrosschainMap) -> Result<Vec<RawClaim>>;
}

/// Per-direction token availability of a bridge route (what can leave `from`, what can
/// arrive on `to`).
#[async_trait]
pub trait TokenAvailabilitySource: Send + Sync {
    async fn token_lists(&self, from: ChainId, to: ChainId, short_list: bool) -> Result<DirectionalLists>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalLists {
    pub from: Vec<ListedToken>,
    pub to: Vec<ListedToken>,
}

/// A token as published in a bridge's availability list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedToken {
    pub address: String,
    #[serde(rename = "chainId")]
    pub chain: ChainId,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "icon", alias = "logoURI", default)]
    pub logo_uri: Option<String>,
}

impl ListedToken {
    pub fn has_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }
}

impl From<&ListedToken> for RawToken {
    fn from(token: &ListedToken) -> Self {
        RawToken {
            chain_id: token.chain.as_u64(),
            address: Some(token.address.clone()),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            logo_uri: token.logo_uri.clone(),
        }
    }
}

/// Enabled feeds in merge order. The Arbitrum and Optimism feeds complete tokens the
/// earlier feeds already mapped, so they run after them.
pub fn default_sources(settings: &Settings) -> Result<Vec<Box<dyn ClaimSource>>> {
    let fetcher = HttpFetcher::new(&settings.http)?;
    let cfg = &settings.sources;
    let mut sources: Vec<Box<dyn ClaimSource>> = Vec::new();

    if cfg.omnibridge.enabled {
        sources.push(Box::new(OmnibridgeSource::new(fetcher.clone(), cfg.omnibridge.clone())));
    }
    if cfg.polygon.enabled {
        sources.push(Box::new(PolygonMapperSource::new(fetcher.clone(), cfg.polygon.clone())));
    }
    if cfg.arbitrum.enabled {
        sources.push(Box::new(ArbitrumGatewaySource::new(cfg.arbitrum.clone())));
    }
    if cfg.optimism.enabled {
        sources.push(Box::new(OptimismListSource::new(fetcher.clone(), cfg.optimism.clone())));
    }
    if settings.socket.pair_source_enabled {
        let client = SocketClient::new(fetcher, &settings.socket)?;
        sources.push(Box::new(SocketPairSource::new(client)));
    }

    info!(
        "Sources: {}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(sources)
}

/// Fixed list of claims, e.g. hand-curated pairs the feeds miss.
pub struct StaticClaims {
    name: &'static str,
    claims: Vec<RawClaim>,
}

impl StaticClaims {
    pub fn new(name: &'static str, claims: Vec<RawClaim>) -> Self {
        Self { name, claims }
    }
}

#[async_trait]
impl ClaimSource for StaticClaims {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_claims(&self, _map: &CrosschainMap) -> Result<Vec<RawClaim>> {
        Ok(self.claims.clone())
    }
}

/// Accepts `12`, `"12"` or `null`; subgraphs serialize numeric fields either way.
pub(crate) fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Removes every case-insensitive occurrence of `needle` from `haystack`.
pub(crate) fn remove_ignore_case(haystack: &str, needle: &str) -> String {
    let needle_lower = needle.to_ascii_lowercase();
    let mut result = haystack.to_string();
    if needle.is_empty() {
        return result;
    }
    while let Some(pos) = result.to_ascii_lowercase().find(&needle_lower) {
        result.replace_range(pos..pos + needle.len(), "");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_token_accepts_icon_and_logo_uri() {
        let socket: ListedToken = serde_json::from_str(
            r#"{"address":"0xAA","chainId":1,"decimals":6,"name":"USD Coin","symbol":"USDC","icon":"https://icon"}"#,
        )
        .unwrap();
        assert_eq!(socket.logo_uri.as_deref(), Some("https://icon"));
        assert!(socket.has_address("0xaa"));

        let listed: ListedToken =
            serde_json::from_str(r#"{"address":"0xbb","chainId":10,"logoURI":"ipfs://x"}"#).unwrap();
        assert_eq!(listed.logo_uri.as_deref(), Some("ipfs://x"));
        assert_eq!(listed.decimals, None);
    }

    #[test]
    fn test_de_opt_u64() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "de_opt_u64")]
            value: Option<u64>,
        }
        let rows: Vec<Row> = serde_json::from_str(r#"[{"value":1},{"value":"100"},{"value":null},{}]"#).unwrap();
        let values: Vec<Option<u64>> = rows.into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(1), Some(100), None, None]);
    }

    #[test]
    fn test_remove_ignore_case() {
        assert_eq!(remove_ignore_case("Wrapped Ether (PoS)", " (POS)"), "Wrapped Ether");
        assert_eq!(remove_ignore_case("USD Coin", " (POS)"), "USD Coin");
    }

    #[test]
    fn test_default_sources_follow_settings() {
        let mut settings = Settings::default();
        let names: Vec<&str> = default_sources(&settings).unwrap().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["OMNIBRIDGE", "POLYGON", "ARBITRUM"]);

        settings.sources.polygon.enabled = false;
        settings.sources.optimism.enabled = true;
        settings.socket.pair_source_enabled = true;
        let names: Vec<&str> = default_sources(&settings).unwrap().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["OMNIBRIDGE", "ARBITRUM", "OPTIMISM", "SOCKET_TOKENS"]);
    }

    #[tokio::test]
    async fn test_static_claims_source() {
        let claim = RawClaim::new(
            RawToken { chain_id: 1, address: Some("0xaa".into()), decimals: Some(6), ..Default::default() },
            RawToken { chain_id: 137, address: Some("0xbb".into()), decimals: Some(6), ..Default::default() },
        );
        let source = StaticClaims::new("STATIC", vec![claim.clone()]);
        let map = CrosschainMap::default();
        assert_eq!(source.fetch_claims(&map).await.unwrap(), vec![claim]);
    }
}
