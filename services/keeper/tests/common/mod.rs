//! In-memory stand-in for the node + DCA contract.
//!
//! Eligible accounts can buy once; afterwards the contract answers with the
//! "period not elapsed" custom error, like the deployed contract does until
//! the account's period comes round again.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::{SolCall, SolError},
};
use async_trait::async_trait;
use keeper::chain::{ChainClient, ChainError, LogEntry, PendingTx, Receipt, TxRequest};
use rbtc_dca::{
    calls::{self, IDcaLegacy, IRbtcDca},
    decode_revert, ContractFlavor, RbtcBought,
};

pub const DCA: Address = Address::repeat_byte(0xdc);
pub const KEEPER: Address = Address::repeat_byte(0x4b);

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Buys once, then reports the period as not elapsed.
    Eligible,
    /// Like `Eligible` with a fixed transaction id.
    EligibleWithTx(B256),
    /// Already bought this period.
    NotElapsed,
    /// Contract rejects with the allowance error.
    NoAllowance,
    /// `submit` cannot reach the node.
    ConnectionRefused,
    /// Sent, but never included within the timeout.
    NeverIncluded,
    /// Included with status 0.
    RevertOnInclusion,
}

pub struct FakeDca {
    flavor: ContractFlavor,
    users: Mutex<Result<Vec<Address>, ChainError>>,
    behaviors: HashMap<Address, Behavior>,
    inclusion_delay: Duration,
    bought: Mutex<HashSet<Address>>,
    pending: Mutex<HashMap<B256, Address>>,
    /// Accounts whose transaction the node accepted.
    pub submits: Mutex<Vec<Address>>,
    pub preflights: Mutex<Vec<Address>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeDca {
    pub fn new(flavor: ContractFlavor) -> Self {
        Self {
            flavor,
            users: Mutex::new(Ok(Vec::new())),
            behaviors: HashMap::new(),
            inclusion_delay: Duration::ZERO,
            bought: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            submits: Mutex::new(Vec::new()),
            preflights: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_users(self, users: &[Address]) -> Self {
        *self.users.lock().unwrap() = Ok(users.to_vec());
        self
    }

    pub fn with_users_error(self, error: ChainError) -> Self {
        *self.users.lock().unwrap() = Err(error);
        self
    }

    pub fn with(mut self, account: Address, behavior: Behavior) -> Self {
        self.behaviors.insert(account, behavior);
        self
    }

    pub fn with_inclusion_delay(mut self, delay: Duration) -> Self {
        self.inclusion_delay = delay;
        self
    }

    pub fn submit_count(&self, account: Address) -> usize {
        self.submits
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == account)
            .count()
    }

    fn behavior(&self, account: Address) -> Behavior {
        self.behaviors
            .get(&account)
            .cloned()
            .unwrap_or(Behavior::Eligible)
    }

    fn not_elapsed(&self) -> ChainError {
        let selector = match self.flavor {
            ContractFlavor::RbtcDca => {
                IRbtcDca::RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed::SELECTOR
            }
            ContractFlavor::Legacy => IDcaLegacy::CannotBuyIfPurchasePeriodHasNotElapsed::SELECTOR,
        };
        ChainError::Revert(decode_revert(&selector))
    }

    fn no_allowance(&self) -> ChainError {
        ChainError::Revert(decode_revert(
            &IRbtcDca::RbtcDca__NotEnoughDocAllowanceForDcaContract::SELECTOR,
        ))
    }

    /// Buyer encoded in purchase calldata, checking the flavour's selector.
    fn buyer(&self, tx: &TxRequest) -> Result<Address, ChainError> {
        let expected = match self.flavor {
            ContractFlavor::RbtcDca => IRbtcDca::buyRbtcCall::SELECTOR,
            ContractFlavor::Legacy => IDcaLegacy::buyCall::SELECTOR,
        };
        if tx.to != DCA || tx.data.len() != 36 || tx.data[..4] != expected {
            return Err(ChainError::Revert(decode_revert(&tx.data)));
        }
        Ok(Address::from_slice(&tx.data[16..36]))
    }

    /// What the contract says when asked to buy for `account` right now.
    fn simulate(&self, account: Address) -> Result<(), ChainError> {
        match self.behavior(account) {
            Behavior::NotElapsed => Err(self.not_elapsed()),
            Behavior::NoAllowance => Err(self.no_allowance()),
            Behavior::ConnectionRefused => Err(ChainError::Transport(
                "eth_estimateGas: error sending request: connection refused".into(),
            )),
            _ if self.bought.lock().unwrap().contains(&account) => Err(self.not_elapsed()),
            _ => Ok(()),
        }
    }
}

pub fn encode_users(users: &[Address]) -> Bytes {
    let mut data = U256::from(32).to_be_bytes::<32>().to_vec();
    data.extend_from_slice(&U256::from(users.len()).to_be_bytes::<32>());
    for user in users {
        data.extend_from_slice(user.into_word().as_slice());
    }
    data.into()
}

fn bought_log(account: Address) -> LogEntry {
    let mut data = U256::from(20u64).to_be_bytes::<32>().to_vec();
    data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
    LogEntry {
        address: DCA,
        topics: vec![RbtcBought::SIGNATURE_HASH, account.into_word()],
        data: data.into(),
    }
}

#[async_trait]
impl ChainClient for FakeDca {
    fn signer_address(&self) -> Address {
        KEEPER
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        if to == DCA && data == calls::get_users_call() {
            return self.users.lock().unwrap().clone().map(|u| encode_users(&u));
        }
        Err(ChainError::Revert(decode_revert(&[])))
    }

    async fn preflight(&self, tx: &TxRequest) -> Result<u64, ChainError> {
        let account = self.buyer(tx)?;
        self.preflights.lock().unwrap().push(account);
        self.simulate(account).map(|_| 95_000)
    }

    async fn submit(&self, tx: TxRequest) -> Result<PendingTx, ChainError> {
        let account = self.buyer(&tx)?;
        self.simulate(account)?;
        self.submits.lock().unwrap().push(account);

        let hash = match self.behavior(account) {
            Behavior::EligibleWithTx(hash) => hash,
            _ => B256::left_padding_from(account.as_slice()),
        };
        self.pending.lock().unwrap().insert(hash, account);
        Ok(PendingTx {
            hash,
            from: KEEPER,
            request: tx,
        })
    }

    async fn await_inclusion(&self, pending: &PendingTx) -> Result<Receipt, ChainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.inclusion_delay.is_zero() {
            tokio::time::sleep(self.inclusion_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let account = self
            .pending
            .lock()
            .unwrap()
            .remove(&pending.hash)
            .ok_or_else(|| ChainError::Malformed("unknown transaction".into()))?;

        match self.behavior(account) {
            Behavior::NeverIncluded => Err(ChainError::Timeout {
                waiting_for: format!("inclusion of {}", pending.hash),
                after: Some(Duration::from_secs(120)),
            }),
            Behavior::RevertOnInclusion => Err(self.no_allowance()),
            _ => {
                self.bought.lock().unwrap().insert(account);
                Ok(Receipt {
                    tx_hash: pending.hash,
                    block_number: 1,
                    success: true,
                    logs: vec![bought_log(account)],
                })
            }
        }
    }
}
