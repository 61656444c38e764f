//! Eligibility Resolver.
//!
//! Produces the accounts to attempt this tick. No local eligibility check
//! is made; the contract decides when the purchase is attempted.

use alloy::primitives::Address;
use rbtc_dca::{calls, ContractFlavor};
use serde::{Deserialize, Serialize};

use crate::{
    chain::{ChainClient, ChainError},
    contract::DcaContract,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSource {
    /// Ask the contract for its registered users every tick.
    #[default]
    Contract,
    /// Fixed list from configuration.
    Static(Vec<Address>),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("reading registered users failed: {0}")]
    Chain(#[from] ChainError),

    #[error("getUsers returned undecodable data: {0}")]
    Decode(String),

    #[error("contract flavor {0:?} has no user registry; configure a static account list")]
    NoRegistry(ContractFlavor),
}

#[derive(Debug, Clone)]
pub struct AccountResolver {
    source: AccountSource,
    contract: DcaContract,
}

impl AccountResolver {
    pub fn new(source: AccountSource, contract: DcaContract) -> Self {
        Self { source, contract }
    }

    pub fn source(&self) -> &AccountSource {
        &self.source
    }

    /// Accounts to attempt, possibly empty.
    pub async fn list_accounts<C>(&self, client: &C) -> Result<Vec<Address>, ResolverError>
    where
        C: ChainClient + ?Sized,
    {
        match &self.source {
            AccountSource::Static(accounts) => Ok(accounts.clone()),
            AccountSource::Contract => {
                if !self.contract.flavor.has_user_registry() {
                    return Err(ResolverError::NoRegistry(self.contract.flavor));
                }
                let raw = self.contract.users_raw(client).await?;
                calls::decode_users(&raw).map_err(|e| ResolverError::Decode(e.to_string()))
            }
        }
    }
}
