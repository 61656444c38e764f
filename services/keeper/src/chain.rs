//! Chain Client: the only component that talks to the node.
//!
//! [`ChainClient`] is the seam the resolver, executor and onboarding tool
//! program against. [`RpcChainClient`] implements it over JSON-RPC with an
//! injected local signer and serialized nonce assignment.

use std::time::Duration;

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    primitives::{Address, Bytes, TxKind, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use async_trait::async_trait;
use rbtc_dca::RevertReason;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{nonce::NonceManager, rpc::JsonRpc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting for {waiting_for}{}", fmt_after(.after))]
    Timeout {
        waiting_for: String,
        after: Option<Duration>,
    },

    #[error("malformed node response: {0}")]
    Malformed(String),

    #[error("node refused request (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("execution reverted: {0}")]
    Revert(RevertReason),

    #[error("signing failed: {0}")]
    Signer(String),
}

fn fmt_after(after: &Option<Duration>) -> String {
    after.map(|d| format!(" after {d:?}")).unwrap_or_default()
}

impl ChainError {
    /// Everything except a contract revert is a node/network problem.
    pub fn is_network(&self) -> bool {
        !matches!(self, Self::Revert(_))
    }

    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            Self::Revert(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A state-changing call to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
}

/// A transaction accepted by the node but not yet included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: B256,
    pub from: Address,
    pub request: TxRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address that signs every submission.
    fn signer_address(&self) -> Address;

    /// Read-only contract call against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Simulates `tx` and returns the gas it would use. Reverts surface as
    /// [`ChainError::Revert`] exactly as they would on submission.
    async fn preflight(&self, tx: &TxRequest) -> Result<u64, ChainError>;

    /// Signs and broadcasts `tx`. Never retries.
    async fn submit(&self, tx: TxRequest) -> Result<PendingTx, ChainError>;

    /// Suspends until `pending` is included or the inclusion timeout elapses.
    /// An included-but-reverted transaction is returned as
    /// [`ChainError::Revert`]; the timeout as [`ChainError::Timeout`].
    async fn await_inclusion(&self, pending: &PendingTx) -> Result<Receipt, ChainError>;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub rpc_timeout: Duration,
    pub inclusion_timeout: Duration,
    pub receipt_poll: Duration,
    /// Gas estimate scaling in percent (120 = +20 %).
    pub gas_multiplier_pct: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(30),
            inclusion_timeout: Duration::from_secs(120),
            receipt_poll: Duration::from_secs(2),
            gas_multiplier_pct: 120,
        }
    }
}

pub struct RpcChainClient {
    rpc: JsonRpc,
    signer: PrivateKeySigner,
    chain_id: u64,
    nonces: NonceManager,
    options: ClientOptions,
}

impl RpcChainClient {
    /// Builds the client and asks the node for its chain id, which every
    /// signature commits to.
    pub async fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        options: ClientOptions,
    ) -> Result<Self, ChainError> {
        let rpc = JsonRpc::new(rpc_url, options.rpc_timeout)?;
        let chain_id = rpc.chain_id().await?;
        Ok(Self {
            rpc,
            signer,
            chain_id,
            nonces: NonceManager::new(),
            options,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc.url()
    }

    pub async fn client_version(&self) -> Result<String, ChainError> {
        self.rpc.client_version().await
    }

    fn gas_limit(&self, estimate: u64) -> u64 {
        estimate
            .saturating_mul(self.options.gas_multiplier_pct)
            .saturating_div(100)
            .max(estimate)
    }

    /// Re-executes a reverted transaction on the state its inclusion block
    /// started from, to recover the revert payload the receipt does not carry.
    async fn replay_revert(&self, pending: &PendingTx, block_number: u64) -> RevertReason {
        let parent = block_number.saturating_sub(1);
        let block = Value::String(format!("0x{parent:x}"));
        match self.rpc.call(pending.from, &pending.request, block).await {
            Err(ChainError::Revert(reason)) => reason,
            Ok(_) => RevertReason::Empty,
            Err(e) => {
                debug!("revert replay for {} failed: {}", pending.hash, e);
                RevertReason::Empty
            }
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx = TxRequest { to, data };
        self.rpc.call(self.signer.address(), &tx, json!("latest")).await
    }

    async fn preflight(&self, tx: &TxRequest) -> Result<u64, ChainError> {
        self.rpc.estimate_gas(self.signer.address(), tx).await
    }

    async fn submit(&self, tx: TxRequest) -> Result<PendingTx, ChainError> {
        let from = self.signer.address();
        // Contract-level rejections surface here, before a nonce is spent.
        let estimate = self.rpc.estimate_gas(from, &tx).await?;
        let gas_price = self.rpc.gas_price().await?;

        let mut slot = self.nonces.lock().await;
        let nonce = slot.reserve(|| self.rpc.transaction_count(from)).await?;

        let unsigned = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit: self.gas_limit(estimate),
            to: TxKind::Call(tx.to),
            value: U256::ZERO,
            input: tx.data.clone(),
        };
        let signature = self
            .signer
            .sign_hash_sync(&unsigned.signature_hash())
            .map_err(|e| ChainError::Signer(e.to_string()))?;
        let signed = unsigned.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();

        match self.rpc.send_raw_transaction(&raw).await {
            Ok(returned) => {
                slot.commit(nonce);
                if returned != hash {
                    warn!("node returned hash {} for locally computed {}", returned, hash);
                }
                debug!("sent {} nonce={} gas_price={}", hash, nonce, gas_price);
                Ok(PendingTx {
                    hash,
                    from,
                    request: tx,
                })
            }
            Err(e) => {
                slot.invalidate();
                Err(e)
            }
        }
    }

    async fn await_inclusion(&self, pending: &PendingTx) -> Result<Receipt, ChainError> {
        let timeout = self.options.inclusion_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            match self.rpc.transaction_receipt(pending.hash).await {
                Ok(Some(receipt)) if receipt.success => return Ok(receipt),
                Ok(Some(receipt)) => {
                    let reason = self.replay_revert(pending, receipt.block_number).await;
                    return Err(ChainError::Revert(reason));
                }
                Ok(None) => {}
                // A flaky poll is not a verdict on the transaction.
                Err(e) if e.is_network() => {
                    warn!("receipt poll for {} failed: {}", pending.hash, e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                self.nonces.resync().await;
                return Err(ChainError::Timeout {
                    waiting_for: format!("inclusion of {}", pending.hash),
                    after: Some(timeout),
                });
            }
            tokio::time::sleep(self.options.receipt_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_vs_revert() {
        assert!(ChainError::Transport("connection refused".into()).is_network());
        assert!(ChainError::Timeout {
            waiting_for: "x".into(),
            after: None
        }
        .is_network());
        assert!(ChainError::Malformed("x".into()).is_network());
        assert!(!ChainError::Revert(RevertReason::Empty).is_network());
        assert_eq!(
            ChainError::Revert(RevertReason::Empty).revert_reason(),
            Some(&RevertReason::Empty)
        );
    }

    #[test]
    fn test_timeout_display() {
        let e = ChainError::Timeout {
            waiting_for: "inclusion of 0xabc".into(),
            after: Some(Duration::from_secs(120)),
        };
        assert_eq!(e.to_string(), "timed out waiting for inclusion of 0xabc after 120s");
        let e = ChainError::Timeout {
            waiting_for: "eth_call".into(),
            after: None,
        };
        assert_eq!(e.to_string(), "timed out waiting for eth_call");
    }

    #[test]
    fn test_default_options() {
        let o = ClientOptions::default();
        assert_eq!(o.inclusion_timeout, Duration::from_secs(120));
        assert_eq!(o.gas_multiplier_pct, 120);
    }
}
