//! Integration tests for the pairing engine
//!
//! Tests cover:
//! - Idempotence and symmetry of claims
//! - Transitive merges across three chains
//! - Conflict rejection and address normalization
//! - Stats derived from the final store

use crosschain_token_map::{
    ChainId, Claim, CrosschainMap, MapError, PairOutcome, RawClaim, RawToken, Severity, SupportedChains, Token,
};
use std::collections::BTreeMap;

fn token(chain: u64, address: &str, symbol: &str, decimals: u8) -> Token {
    Token::new(ChainId(chain), address, symbol, symbol, decimals)
}

fn address_sets(map: &CrosschainMap) -> Vec<BTreeMap<ChainId, String>> {
    let mut sets: Vec<BTreeMap<ChainId, String>> = map.store().identities().map(|i| i.addresses.clone()).collect();
    sets.sort();
    sets
}

/// The USDC example: one claim, one identity, both addresses lowercased.
#[test]
fn test_usdc_scenario() {
    let mut map = CrosschainMap::default();
    let outcome = map
        .add_pair(&token(1, "0xAA", "USDC", 6), &token(137, "0xBB", "USDC", 6))
        .unwrap();
    let i1 = match outcome {
        PairOutcome::Created(id) => id,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(map.store().lookup_identity_id(ChainId(1), "0xaa"), Some(i1));
    assert_eq!(map.store().lookup_identity_id(ChainId(137), "0xbb"), Some(i1));

    let expected: BTreeMap<ChainId, String> =
        [(ChainId(1), "0xaa".to_string()), (ChainId(137), "0xbb".to_string())].into_iter().collect();
    assert_eq!(map.store().identity(i1).unwrap().addresses, expected);
}

#[test]
fn test_add_pair_is_idempotent() {
    let mut map = CrosschainMap::default();
    let a = token(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6);
    let b = token(137, "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174", "USDC", 6);

    let first = map.add_pair(&a, &b).unwrap();
    let snapshot = serde_json::to_value(map.store()).unwrap();
    assert!(map.log().is_empty());

    let second = map.add_pair(&a, &b).unwrap();
    assert_eq!(second, PairOutcome::Reused(first.id().unwrap()));
    assert_eq!(serde_json::to_value(map.store()).unwrap(), snapshot);
    assert_eq!(map.log().len(), 1);
    assert_eq!(map.log().entries()[0].severity, Severity::Warn);
}

#[test]
fn test_add_pair_is_symmetric() {
    let a = token(1, "0xaa", "USDC", 6);
    let b = token(137, "0xbb", "USDC.e", 6);

    let mut forward = CrosschainMap::default();
    forward.add_pair(&a, &b).unwrap();
    let mut backward = CrosschainMap::default();
    backward.add_pair(&b, &a).unwrap();

    assert_eq!(address_sets(&forward), address_sets(&backward));
    // token A's metadata wins in each direction
    assert_eq!(forward.store().identities().next().unwrap().symbol, "USDC");
    assert_eq!(backward.store().identities().next().unwrap().symbol, "USDC.e");
}

#[test]
fn test_transitive_merge() {
    let mut map = CrosschainMap::default();
    let x = token(1, "0x01", "DAI", 18);
    let y = token(100, "0x02", "DAI", 18);
    let z = token(137, "0x03", "DAI", 18);

    let id = map.add_pair(&x, &y).unwrap().id().unwrap();
    assert_eq!(map.add_pair(&y, &z).unwrap(), PairOutcome::Extended(id));

    assert_eq!(map.store().len(), 1);
    let identity = map.store().identity(id).unwrap();
    assert_eq!(identity.chain_count(), 3);
    for t in [&x, &y, &z] {
        assert_eq!(map.lookup_identity_id(t), Some(id));
    }
    map.store().check_consistency().unwrap();
}

#[test]
fn test_conflicting_slot_is_rejected() {
    let mut map = CrosschainMap::default();
    let p = token(1, "0xP", "USDC", 6);
    let y = token(137, "0xY", "USDC", 6);
    let id = map.add_pair(&p, &y).unwrap().id().unwrap();

    // different address and different decimals on chain 1 for the same identity
    let q = token(1, "0xQ", "USDC", 18);
    let outcome = map.add_pair(&q, &y).unwrap();
    assert_eq!(outcome, PairOutcome::Rejected { id: Some(id) });

    let identity = map.store().identity(id).unwrap();
    assert_eq!(identity.address_on(ChainId(1)), Some("0xp"));
    assert_eq!(identity.decimals_on(ChainId(1)), Some(6));
    assert_eq!(map.lookup_identity_id(&q), None);
    assert_eq!(map.log().error_count(), 1);
    map.store().check_consistency().unwrap();
}

#[test]
fn test_replaced_slot_is_logged() {
    let mut map = CrosschainMap::default();
    let p = token(1, "0xP", "USDC", 6);
    let y = token(137, "0xY", "USDC", 6);
    let id = map.add_pair(&p, &y).unwrap().id().unwrap();

    // same decimals, different address on chain 1
    let q = token(1, "0xQ", "USDC", 6);
    assert_eq!(map.add_pair(&q, &y).unwrap(), PairOutcome::Extended(id));

    assert_eq!(map.lookup_identity_id(&p), None);
    assert_eq!(map.lookup_identity_id(&q), Some(id));
    assert_eq!(map.store().identity(id).unwrap().address_on(ChainId(1)), Some("0xq"));
    map.store().check_consistency().unwrap();

    let replaced: Vec<_> = map
        .log()
        .entries()
        .iter()
        .filter(|e| e.method == "updateCrosschainToken")
        .collect();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].severity, Severity::Warn);
    assert_eq!(replaced[0].message, "Address replaced: 0xp -> 0xq");
    assert_eq!(replaced[0].id, Some(id));
    // the entry keeps the identity as it was before the swap
    assert_eq!(replaced[0].crosschain_token.as_ref().unwrap().address_on(ChainId(1)), Some("0xp"));

    // a feed flipping the slot back leaves a second trace
    map.add_pair(&p, &y).unwrap();
    let swaps = map
        .log()
        .entries()
        .iter()
        .filter(|e| e.message.starts_with("Address replaced"))
        .count();
    assert_eq!(swaps, 2);
    assert_eq!(map.lookup_identity_id(&q), None);
}

#[test]
fn test_address_case_is_normalized() {
    let mut map = CrosschainMap::default();
    let id = map
        .add_pair(&token(1, "0xAbC", "WETH", 18), &token(42161, "0xDeF", "WETH", 18))
        .unwrap()
        .id()
        .unwrap();

    assert_eq!(map.store().lookup_identity_id(ChainId(1), "0xabc"), Some(id));
    assert_eq!(map.store().lookup_identity_id(ChainId(42161), " 0xdef "), Some(id));
    assert_eq!(map.store().index_for(ChainId(1)).unwrap().len(), 1);
}

#[test]
fn test_stats_reflect_current_store() {
    let mut map = CrosschainMap::default();
    let claims = vec![
        Claim::new(token(1, "0x01", "USDC", 6), token(137, "0x02", "USDC", 6)),
        Claim::new(token(137, "0x02", "USDC", 6), token(100, "0x03", "USDC", 6)),
        Claim::new(token(1, "0x10", "AAVE", 18), token(137, "0x11", "AAVE", 18)),
        Claim::new(token(1, "0x10", "AAVE", 18), token(137, "0x11", "AAVE", 18)),
    ];
    map.add_pairs(claims.iter()).unwrap();

    let stats = map.stats();
    assert_eq!(stats.token_count, 2);
    assert_eq!(stats.mapped_token_count, 2);
    assert_eq!(stats.orphan_token_count, 0);
    assert_eq!(stats.mapped_tokens_by_chain_count.get(&3), Some(&1));
    assert_eq!(stats.mapped_tokens_by_chain_count.get(&2), Some(&1));
    assert_eq!(stats.mapped_tokens_by_chain.get(&ChainId(137)), Some(&2));
    assert_eq!(stats.log_count, map.log().len());
    assert_eq!(stats.error_count, 0);

    map.add_pair(&token(1, "0x20", "LINK", 18), &token(137, "0x21", "LINK", 18))
        .unwrap();
    assert_eq!(map.stats().token_count, 3);
    assert_eq!(map.stats().mapped_tokens_by_chain.get(&ChainId(137)), Some(&3));
}

#[test]
fn test_malformed_feed_data_is_fatal() {
    let supported = SupportedChains::new([ChainId::MAINNET, ChainId::POLYGON]);
    let mut map = CrosschainMap::new(supported);

    let unsupported = RawClaim::new(
        RawToken { chain_id: 1, address: Some("0xaa".into()), decimals: Some(6), ..Default::default() },
        RawToken { chain_id: 250, address: Some("0xbb".into()), decimals: Some(6), ..Default::default() },
    );
    assert!(matches!(map.add_raw_pairs(vec![unsupported]), Err(MapError::UnsupportedChain(250))));

    let no_address = RawClaim::new(
        RawToken { chain_id: 1, address: None, decimals: Some(6), ..Default::default() },
        RawToken { chain_id: 137, address: Some("0xbb".into()), decimals: Some(6), ..Default::default() },
    );
    assert!(matches!(map.add_raw_pairs(vec![no_address]), Err(MapError::MissingAddress { .. })));
    assert!(map.store().is_empty());
}
