use crate::chains::ChainId;
use crate::token::IdentityId;

/// Fatal conditions. These abort the operation that detected them because the
/// lists built afterwards would be silently incomplete.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Unsupported chain id: {0}")]
    UnsupportedChain(u64),
    #[error("Token on chain {chain} has no address")]
    MissingAddress { chain: ChainId },
    #[error("Token {address} on chain {chain} has no decimals")]
    MissingDecimals { chain: ChainId, address: String },
    #[error("Crosschain token {id} has no address on chain {chain}")]
    MissingRouteAddress { id: IdentityId, chain: ChainId },
    #[error("Native wrapper for chain {chain} is not mapped")]
    MissingNativeWrapper { chain: ChainId },
}
