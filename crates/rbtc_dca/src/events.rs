//! Events emitted by the DCA contract that the keeper reads back from
//! transaction receipts.

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolEvent,
};

use crate::calls::IRbtcDca;

/// Emitted when a purchase executes for `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbtcBought {
    pub user: Address,
    /// DOC spent, 18 decimals.
    pub doc_amount: U256,
    /// rBTC received, 18 decimals.
    pub rbtc_amount: U256,
}

impl RbtcBought {
    pub const SIGNATURE_HASH: B256 = IRbtcDca::RbtcBought::SIGNATURE_HASH;

    /// Decodes one receipt log. Returns `None` for any other event.
    ///
    /// Layout: topic0 = signature hash, topic1 = indexed user,
    /// data = `docAmount ‖ rbtcAmount`.
    pub fn from_log(topics: &[B256], data: &[u8]) -> Option<Self> {
        if topics.first() != Some(&Self::SIGNATURE_HASH) {
            return None;
        }
        let user = Address::from_word(*topics.get(1)?);
        if data.len() < 64 {
            return None;
        }
        Some(Self {
            user,
            doc_amount: U256::from_be_slice(&data[..32]),
            rbtc_amount: U256::from_be_slice(&data[32..64]),
        })
    }
}
