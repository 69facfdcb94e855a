use crate::chains::{ChainId, SupportedChains};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Chains {
    /// Chains claims may reference; anything else aborts ingestion.
    #[serde(default = "default_supported_chains")]
    pub supported: Vec<u64>,
    /// Chains route lists are built between.
    #[serde(default = "default_production_chains")]
    pub production: Vec<u64>,
}

fn default_supported_chains() -> Vec<u64> {
    ChainId::KNOWN.iter().map(|c| c.as_u64()).collect()
}
fn default_production_chains() -> Vec<u64> {
    ChainId::PRODUCTION.iter().map(|c| c.as_u64()).collect()
}

impl Default for Chains {
    fn default() -> Self {
        Self {
            supported: default_supported_chains(),
            production: default_production_chains(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Http {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_max_delay_ms() -> u64 {
    5000
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolygonSource {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_polygon_mapper_url")]
    pub mapper_url: String,
    #[serde(default = "default_polygon_page_size")]
    pub page_size: usize,
    /// Root tokens the mapper lists under a broken WETH mapping.
    #[serde(default = "default_polygon_ignored_root_tokens")]
    pub ignored_root_tokens: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_polygon_mapper_url() -> String {
    "https://tokenmapper.api.matic.today/api/v1/mapping".to_string()
}
fn default_polygon_page_size() -> usize {
    200
}
fn default_polygon_ignored_root_tokens() -> Vec<String> {
    vec![
        "0xa45b966996374E9e65ab991C6FE4Bfce3a56DDe8".to_string(),
        "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".to_string(),
    ]
}

impl Default for PolygonSource {
    fn default() -> Self {
        Self {
            enabled: true,
            mapper_url: default_polygon_mapper_url(),
            page_size: default_polygon_page_size(),
            ignored_root_tokens: default_polygon_ignored_root_tokens(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OmnibridgeSource {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_subgraph_base_url")]
    pub subgraph_base_url: String,
    /// Home-side subgraph of every bridge pair (xDai, BSC, ...).
    #[serde(default = "default_omnibridge_graphs")]
    pub home_graph_names: Vec<String>,
}

fn default_subgraph_base_url() -> String {
    "https://api.thegraph.com/subgraphs/name/".to_string()
}
fn default_omnibridge_graphs() -> Vec<String> {
    vec![
        "raid-guild/xdai-omnibridge".to_string(),
        "dan13ram/bsc-to-mainnet-omnibridge".to_string(),
        "dan13ram/xdai-to-bsc-omnibridge".to_string(),
    ]
}

impl Default for OmnibridgeSource {
    fn default() -> Self {
        Self {
            enabled: true,
            subgraph_base_url: default_subgraph_base_url(),
            home_graph_names: default_omnibridge_graphs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OptimismSource {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_optimism_list_url")]
    pub token_list_url: String,
}

fn default_false() -> bool {
    false
}
fn default_optimism_list_url() -> String {
    "https://raw.githubusercontent.com/ethereum-optimism/ethereum-optimism.github.io/master/optimism.tokenlist.json"
        .to_string()
}

impl Default for OptimismSource {
    fn default() -> Self {
        Self {
            enabled: false,
            token_list_url: default_optimism_list_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArbitrumSource {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mainnet_rpc_url")]
    pub mainnet_rpc_url: String,
    #[serde(default = "default_arbitrum_rpc_url")]
    pub arbitrum_rpc_url: String,
    #[serde(default = "default_l1_gateway_router")]
    pub l1_gateway_router: String,
    #[serde(default = "default_rpc_concurrency")]
    pub max_concurrent_calls: usize,
}

fn default_mainnet_rpc_url() -> String {
    "https://eth.llamarpc.com".to_string()
}
fn default_arbitrum_rpc_url() -> String {
    "https://arb1.arbitrum.io/rpc".to_string()
}
fn default_l1_gateway_router() -> String {
    "0x72Ce9c846789fdB6fC1f34aC4AD25Dd9ef7031ef".to_string()
}
fn default_rpc_concurrency() -> usize {
    8
}

impl Default for ArbitrumSource {
    fn default() -> Self {
        Self {
            enabled: true,
            mainnet_rpc_url: default_mainnet_rpc_url(),
            arbitrum_rpc_url: default_arbitrum_rpc_url(),
            l1_gateway_router: default_l1_gateway_router(),
            max_concurrent_calls: default_rpc_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Socket {
    /// Also use Socket's symbol-matched lists as a claim source.
    #[serde(default = "default_false")]
    pub pair_source_enabled: bool,
    #[serde(default = "default_socket_base_url")]
    pub base_url: String,
    #[serde(default = "default_socket_api_key")]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub single_tx_only: bool,
}

fn default_socket_base_url() -> String {
    "https://backend.movr.network/v2/".to_string()
}
fn default_socket_api_key() -> String {
    // public key published by Socket for front-end use
    "645b2c8c-5825-4930-baf3-d9b997fcd88c".to_string()
}

impl Default for Socket {
    fn default() -> Self {
        Self {
            pair_source_enabled: false,
            base_url: default_socket_base_url(),
            api_key: default_socket_api_key(),
            single_tx_only: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Sources {
    #[serde(default)]
    pub polygon: PolygonSource,
    #[serde(default)]
    pub omnibridge: OmnibridgeSource,
    #[serde(default)]
    pub optimism: OptimismSource,
    #[serde(default)]
    pub arbitrum: ArbitrumSource,
}

/// Override for one row of the native wrapper table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NativeWrapper {
    pub chain: u64,
    pub reference_chain: u64,
    pub reference_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Output {
    #[serde(default = "default_debug_dir")]
    pub debug_dir: String,
    #[serde(default = "default_lists_dir")]
    pub lists_dir: String,
}

fn default_debug_dir() -> String {
    "debug".to_string()
}
fn default_lists_dir() -> String {
    "lists".to_string()
}

impl Default for Output {
    fn default() -> Self {
        Self {
            debug_dir: default_debug_dir(),
            lists_dir: default_lists_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub chains: Chains,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub sources: Sources,
    #[serde(default)]
    pub socket: Socket,
    #[serde(default)]
    pub native_wrappers: Vec<NativeWrapper>,
    #[serde(default)]
    pub output: Output,
}

/// Parses "1, 137,42161" style lists; returns None on any bad element.
fn parse_chain_list(raw: &str) -> Option<Vec<u64>> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .split(',')
        .map(|item| item.trim().trim_matches('"').parse::<u64>().ok())
        .collect()
}

impl Settings {
    /// Loads `Config.toml` from the working directory if present, then env overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Config::builder().add_source(File::with_name("Config").required(false)))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Config::builder().add_source(File::with_name(path)))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let s = builder.build()?;
        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var("CCM_SUPPORTED_CHAINS") {
            match parse_chain_list(&raw) {
                Some(list) => self.chains.supported = list,
                None => log::warn!("Ignoring malformed CCM_SUPPORTED_CHAINS: {}", raw),
            }
        }
        if let Ok(raw) = env::var("CCM_PRODUCTION_CHAINS") {
            match parse_chain_list(&raw) {
                Some(list) => self.chains.production = list,
                None => log::warn!("Ignoring malformed CCM_PRODUCTION_CHAINS: {}", raw),
            }
        }
        if let Ok(key) = env::var("CCM_SOCKET_API_KEY") {
            if !key.trim().is_empty() {
                self.socket.api_key = key.trim().to_string();
            }
        }
        if let Ok(url) = env::var("CCM_MAINNET_RPC_URL") {
            if !url.trim().is_empty() {
                self.sources.arbitrum.mainnet_rpc_url = url.trim().to_string();
            }
        }
        if let Ok(url) = env::var("CCM_ARBITRUM_RPC_URL") {
            if !url.trim().is_empty() {
                self.sources.arbitrum.arbitrum_rpc_url = url.trim().to_string();
            }
        }
    }

    pub fn supported_chains(&self) -> SupportedChains {
        SupportedChains::new(self.chains.supported.iter().copied().map(ChainId))
    }

    /// Production chains, restricted to the supported set.
    pub fn production_chains(&self) -> Vec<ChainId> {
        let supported = self.supported_chains();
        self.chains
            .production
            .iter()
            .copied()
            .map(ChainId)
            .filter(|c| supported.contains(*c))
            .collect()
    }
}
