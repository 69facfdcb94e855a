//! # Crosschain Token Map
//!
//! Merges per-chain token records that represent the same asset into cross-chain
//! identities, and builds per-route token lists for a bridge front-end from them.
//!
//! ## Overview
//!
//! Bridge feeds (Polygon PoS mapper, Omnibridge subgraphs, Optimism token list, the
//! Arbitrum gateway, Socket) emit claims of the form "token A on chain X is the same
//! asset as token B on chain Y". The pairing engine folds those claims into an identity
//! store, flagging contradictions instead of resolving them.
//!
//! ## Architecture
//!
//! ### Core
//! `IdentityStore` holds identities and the per-chain address index. `CrosschainMap`
//! is the only writer: it validates each claim, then creates, extends or rejects.
//!
//! ### Diagnostics
//! Every contradiction lands in an append-only log; `MapStats` summarizes the store.
//!
//! ### Derived Lists
//! Route lists intersect a bridge's per-direction availability with the store and
//! add wrapped native tokens where a side bridges the native currency.

// Core Types
/// Chain ids and the supported chain set
pub mod chains;
/// Tokens, claims and cross-chain identities
pub mod token;
/// Fatal error taxonomy
pub mod error;

// Identity Resolution
/// Identity store and per-chain address index
pub mod identity_store;
/// Pairing engine
pub mod crosschain_map;
/// Diagnostic log and stats
pub mod diagnostics;

// Lists
/// Per-route token lists and native wrapper injection
pub mod derived_list;

// Infrastructure
/// Claim feeds and bridge availability lists
pub mod sources;
/// JSON fetching with retries
pub mod http;
/// JSON file export
pub mod export;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use chains::{ChainId, SupportedChains};
pub use crosschain_map::{CrosschainMap, PairOutcome, PairingReport};
pub use diagnostics::{DiagnosticLog, LogEntry, MapStats, Severity};
pub use error::MapError;
pub use identity_store::IdentityStore;
pub use settings::Settings;
pub use token::{AssetIdentity, Claim, IdentityId, RawClaim, RawToken, Token};
