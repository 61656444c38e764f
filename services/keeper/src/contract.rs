//! Keeper-side view of the deployed DCA contract.

use alloy::primitives::Address;
use rbtc_dca::{calls, ContractFlavor, RbtcBought};

use crate::chain::{ChainClient, ChainError, LogEntry, TxRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcaContract {
    pub address: Address,
    pub flavor: ContractFlavor,
}

impl DcaContract {
    pub fn new(address: Address, flavor: ContractFlavor) -> Self {
        Self { address, flavor }
    }

    pub fn purchase_request(&self, account: Address) -> TxRequest {
        TxRequest {
            to: self.address,
            data: self.flavor.purchase_call(account),
        }
    }

    /// Raw `getUsers()` return data.
    pub async fn users_raw<C>(&self, client: &C) -> Result<alloy::primitives::Bytes, ChainError>
    where
        C: ChainClient + ?Sized,
    {
        client.call(self.address, calls::get_users_call()).await
    }

    /// First `RbtcBought` emitted by this contract among `logs`.
    pub fn purchase_event(&self, logs: &[LogEntry]) -> Option<RbtcBought> {
        logs.iter()
            .filter(|log| log.address == self.address)
            .find_map(|log| RbtcBought::from_log(&log.topics, &log.data))
    }
}
