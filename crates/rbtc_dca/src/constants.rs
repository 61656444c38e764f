//! Network and deployment constants for the DCA contract.

use alloy::primitives::{address, Address};

/// Public RSK testnet node used when no endpoint is configured.
pub const DEFAULT_RPC_URL: &str = "https://public-node.testnet.rsk.co";

/// RSK mainnet chain id.
pub const RSK_MAINNET_CHAIN_ID: u64 = 30;

/// RSK testnet chain id.
pub const RSK_TESTNET_CHAIN_ID: u64 = 31;

/// DOC token on RSK testnet.
pub const DOC_TOKEN_TESTNET: Address = address!("CB46c0ddc60D18eFEB0E586C17Af6ea36452Dae0");

/// DOC uses 18 decimals, same as rBTC.
pub const DOC_DECIMALS: u8 = 18;

/// Human name for the RSK networks; `None` for any other chain.
pub fn network_name(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        RSK_MAINNET_CHAIN_ID => Some("RSK mainnet"),
        RSK_TESTNET_CHAIN_ID => Some("RSK testnet"),
        _ => None,
    }
}
