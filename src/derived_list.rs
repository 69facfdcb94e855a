//! # Derived Lists
//!
//! Builds per-route token lists from the identity store and a bridge's availability
//! lists. A token makes it into the A→B list only when the bridge accepts it on A,
//! delivers it on B, and the store already knows both sides are the same asset.
//!
//! ## Features
//!
//! - Directional (`"A-B"`, `"B-A"`) or bidirectional (`"min-max"`) route lists
//! - Native wrapper injection driven by an explicit per-chain table
//! - Chain pair enumeration over the production chains

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::chains::{chain_pairs, ChainId};
use crate::error::MapError;
use crate::identity_store::IdentityStore;
use crate::settings::NativeWrapper;
use crate::sources::{DirectionalLists, ListedToken, TokenAvailabilitySource};
use crate::token::{normalize_address, AssetIdentity, IdentityId, Token};

/// Address bridges use for a chain's native currency.
pub const NATIVE_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

pub const WETH_MAINNET: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
pub const DAI_MAINNET: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
pub const MATIC_MAINNET: &str = "0x7d1afa7b718fb893db30a3abc0cfc608aacfebb0";
pub const BNB_MAINNET: &str = "0xb8c77482e45f1f44de1745f52c74426c631bdd52";

/// Route key → token list, in build order.
pub type RouteLists = IndexMap<String, Vec<Token>>;

/// Identities reachable from the `from` list's chain to the `to` list's chain.
///
/// The logo comes from the destination listing, since that is what the UI shows.
pub fn lists_intersection(from: &[ListedToken], to: &[ListedToken], store: &IdentityStore) -> Vec<AssetIdentity> {
    let from_chain = match from.first() {
        Some(token) => token.chain,
        None => return Vec::new(),
    };

    to.iter()
        .filter_map(|token| {
            let identity = store.lookup_identity(token.chain, &token.address)?;
            let from_address = identity.address_on(from_chain)?;
            // mapped, but the bridge doesn't take the counterpart on the source chain
            from.iter().find(|f| f.has_address(from_address))?;

            let mut paired = identity.clone();
            if token.logo_uri.is_some() {
                paired.logo_uri = token.logo_uri.clone();
            }
            Some(paired)
        })
        .collect()
}

/// Identities routable in both directions, once each.
pub fn bidirectional_list(ab: &[AssetIdentity], ba: &[AssetIdentity]) -> Vec<AssetIdentity> {
    let reverse: HashSet<IdentityId> = ba.iter().map(|identity| identity.id).collect();
    let mut seen = HashSet::new();

    ab.iter()
        .filter(|identity| reverse.contains(&identity.id) && seen.insert(identity.id))
        .cloned()
        .collect()
}

/// Flattens identities into the `chain_a` and `chain_b` token of each.
pub fn identities_to_token_list(
    chain_a: ChainId,
    chain_b: ChainId,
    identities: &[AssetIdentity],
) -> Result<Vec<Token>, MapError> {
    let mut tokens = Vec::with_capacity(identities.len() * 2);
    for identity in identities {
        for chain in [chain_a, chain_b] {
            let token = identity
                .token_on(chain)
                .ok_or(MapError::MissingRouteAddress { id: identity.id, chain })?;
            tokens.push(token);
        }
    }
    Ok(tokens)
}

/// Where a chain's wrapped native asset can be found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeWrapperRef {
    pub reference_chain: ChainId,
    pub reference_address: String,
}

/// Chain → wrapped native asset, looked up through its reference chain address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeWrapperTable {
    rows: BTreeMap<ChainId, NativeWrapperRef>,
}

impl Default for NativeWrapperTable {
    fn default() -> Self {
        let mut table = Self { rows: BTreeMap::new() };
        for chain in [ChainId::MAINNET, ChainId::OPTIMISM, ChainId::ARBITRUM] {
            table.insert(chain, ChainId::MAINNET, WETH_MAINNET);
        }
        table.insert(ChainId::GNOSIS, ChainId::MAINNET, DAI_MAINNET);
        table.insert(ChainId::POLYGON, ChainId::MAINNET, MATIC_MAINNET);
        table.insert(ChainId::BSC, ChainId::MAINNET, BNB_MAINNET);
        table
    }
}

impl NativeWrapperTable {
    /// Defaults with configured rows layered on top.
    pub fn from_settings(overrides: &[NativeWrapper]) -> Self {
        let mut table = Self::default();
        for row in overrides {
            table.insert(ChainId(row.chain), ChainId(row.reference_chain), &row.reference_address);
        }
        table
    }

    pub fn insert(&mut self, chain: ChainId, reference_chain: ChainId, reference_address: &str) {
        self.rows.insert(
            chain,
            NativeWrapperRef {
                reference_chain,
                reference_address: normalize_address(reference_address),
            },
        );
    }

    pub fn get(&self, chain: ChainId) -> Option<&NativeWrapperRef> {
        self.rows.get(&chain)
    }

    /// Identity of the wrapped native asset of `chain`.
    pub fn resolve<'s>(&self, chain: ChainId, store: &'s IdentityStore) -> Result<&'s AssetIdentity, MapError> {
        self.get(chain)
            .and_then(|row| store.lookup_identity(row.reference_chain, &row.reference_address))
            .ok_or(MapError::MissingNativeWrapper { chain })
    }
}

fn contains_token(tokens: &[Token], chain: ChainId, address: &str) -> bool {
    let address = normalize_address(address);
    tokens
        .iter()
        .any(|t| t.chain == chain && t.normalized_address() == address)
}

fn find_listed<'l>(list: &'l [ListedToken], address: Option<&str>) -> Option<&'l ListedToken> {
    let address = address?;
    list.iter().find(|t| t.has_address(address))
}

fn wrapper_token(
    wrapper: &AssetIdentity,
    chain: ChainId,
    listed: &ListedToken,
) -> Result<Token, MapError> {
    let mut token = wrapper
        .token_on(chain)
        .ok_or(MapError::MissingRouteAddress { id: wrapper.id, chain })?;
    token.logo_uri = listed.logo_uri.clone();
    Ok(token)
}

/// Wrapper tokens to add to a directional list when one side bridges the native currency.
///
/// Native ETH leaving mainnet for Gnosis arrives as WETH on Gnosis, so Gnosis WETH goes
/// on the list; native xDAI arriving on Gnosis leaves mainnet as DAI, so mainnet DAI
/// goes on the list. Tokens already in `token_list` are not repeated.
pub fn unidirectional_native_wrappers(
    from_chain: ChainId,
    to_chain: ChainId,
    lists: &DirectionalLists,
    store: &IdentityStore,
    table: &NativeWrapperTable,
    token_list: &[Token],
) -> Result<Vec<Token>, MapError> {
    let from_native = lists.from.iter().any(|t| t.has_address(NATIVE_ADDRESS));
    let to_native = lists.to.iter().any(|t| t.has_address(NATIVE_ADDRESS));

    let mut wrappers = Vec::new();

    if from_native {
        let from_wrapped = table.resolve(from_chain, store)?;
        if let Some(on_to) = find_listed(&lists.to, from_wrapped.address_on(to_chain)) {
            if !contains_token(token_list, to_chain, &on_to.address) {
                wrappers.push(wrapper_token(from_wrapped, to_chain, on_to)?);
            }
        }
    }

    if to_native {
        let to_wrapped = table.resolve(to_chain, store)?;
        if let Some(on_from) = find_listed(&lists.from, to_wrapped.address_on(from_chain)) {
            if !contains_token(token_list, from_chain, &on_from.address)
                && !contains_token(&wrappers, from_chain, &on_from.address)
            {
                wrappers.push(wrapper_token(to_wrapped, from_chain, on_from)?);
            }
        }
    }

    Ok(wrappers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOptions {
    /// One `min-max` list per chain pair instead of one list per direction.
    pub bidirectional: bool,
    pub inject_native_wrappers: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            bidirectional: false,
            inject_native_wrappers: true,
        }
    }
}

/// Availability lists for both directions of a chain pair.
#[derive(Debug, Clone, Default)]
pub struct RouteAvailability {
    pub a_to_b: DirectionalLists,
    pub b_to_a: DirectionalLists,
}

pub fn route_key(from: ChainId, to: ChainId) -> String {
    format!("{}-{}", from, to)
}

pub struct RouteListBuilder<'a> {
    store: &'a IdentityStore,
    wrappers: &'a NativeWrapperTable,
}

impl<'a> RouteListBuilder<'a> {
    pub fn new(store: &'a IdentityStore, wrappers: &'a NativeWrapperTable) -> Self {
        Self { store, wrappers }
    }

    fn inject_wrappers(
        &self,
        from: ChainId,
        to: ChainId,
        lists: &DirectionalLists,
        tokens: &mut Vec<Token>,
    ) -> Result<(), MapError> {
        let wrappers = unidirectional_native_wrappers(from, to, lists, self.store, self.wrappers, tokens)?;
        tokens.extend(wrappers);
        Ok(())
    }

    pub fn build(
        &self,
        chain_a: ChainId,
        chain_b: ChainId,
        availability: &RouteAvailability,
        options: RouteOptions,
    ) -> Result<RouteLists, MapError> {
        let ab = lists_intersection(&availability.a_to_b.from, &availability.a_to_b.to, self.store);
        let ba = lists_intersection(&availability.b_to_a.from, &availability.b_to_a.to, self.store);
        debug!("Route {}-{}: {} forward, {} reverse", chain_a, chain_b, ab.len(), ba.len());

        let mut lists = RouteLists::new();

        if options.bidirectional {
            let mut tokens = identities_to_token_list(chain_a, chain_b, &bidirectional_list(&ab, &ba))?;
            if options.inject_native_wrappers {
                self.inject_wrappers(chain_a, chain_b, &availability.a_to_b, &mut tokens)?;
                self.inject_wrappers(chain_b, chain_a, &availability.b_to_a, &mut tokens)?;
            }
            let key = route_key(chain_a.min(chain_b), chain_a.max(chain_b));
            lists.insert(key, tokens);
        } else {
            let mut ab_tokens = identities_to_token_list(chain_a, chain_b, &ab)?;
            let mut ba_tokens = identities_to_token_list(chain_a, chain_b, &ba)?;
            if options.inject_native_wrappers {
                self.inject_wrappers(chain_a, chain_b, &availability.a_to_b, &mut ab_tokens)?;
                self.inject_wrappers(chain_b, chain_a, &availability.b_to_a, &mut ba_tokens)?;
            }
            lists.insert(route_key(chain_a, chain_b), ab_tokens);
            lists.insert(route_key(chain_b, chain_a), ba_tokens);
        }

        Ok(lists)
    }
}

/// Fetches both directions of a chain pair.
pub async fn fetch_route_availability<S>(
    source: &S,
    chain_a: ChainId,
    chain_b: ChainId,
    short_list: bool,
) -> Result<RouteAvailability>
where
    S: TokenAvailabilitySource + ?Sized,
{
    let (a_to_b, b_to_a) = tokio::try_join!(
        source.token_lists(chain_a, chain_b, short_list),
        source.token_lists(chain_b, chain_a, short_list)
    )?;
    Ok(RouteAvailability { a_to_b, b_to_a })
}

/// Route lists for every unordered pair of `chains`.
pub async fn build_route_lists<S>(
    source: &S,
    builder: &RouteListBuilder<'_>,
    chains: &[ChainId],
    short_list: bool,
    options: RouteOptions,
) -> Result<RouteLists>
where
    S: TokenAvailabilitySource + ?Sized,
{
    let mut all = RouteLists::new();

    for (chain_a, chain_b) in chain_pairs(chains) {
        let availability = fetch_route_availability(source, chain_a, chain_b, short_list).await?;
        let lists = builder.build(chain_a, chain_b, &availability, options)?;
        for (key, tokens) in lists {
            info!("Route {}: {} tokens", key, tokens.len());
            all.insert(key, tokens);
        }
    }

    Ok(all)
}
