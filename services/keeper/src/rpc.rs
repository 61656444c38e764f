//! Thin Ethereum JSON-RPC transport over `reqwest`.
//!
//! Each helper maps one node method. Node-side errors are split here into
//! contract reverts (decoded from the error `data` payload) and everything
//! else, so callers never inspect message strings.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy::primitives::{Address, Bytes, Log, B256, U128, U64};
use rbtc_dca::{decode_revert, RevertReason};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chain::{ChainError, LogEntry, Receipt, TxRequest};

/// JSON-RPC error code geth-compatible nodes use for `execution reverted`.
const EXECUTION_REVERTED: i64 = 3;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Classifies a node error. A revert payload in `data` always wins; a
    /// revert without payload still counts as a contract rejection.
    pub fn into_chain_error(self) -> ChainError {
        if let Some(payload) = self.data.as_ref().and_then(revert_payload) {
            return ChainError::Revert(decode_revert(&payload));
        }
        if self.code == EXECUTION_REVERTED || self.message.to_ascii_lowercase().contains("revert")
        {
            return ChainError::Revert(RevertReason::Empty);
        }
        ChainError::Rpc {
            code: self.code,
            message: self.message,
        }
    }
}

/// Revert bytes sit either directly in `data` or one level down
/// (`data.data`), depending on the node implementation.
fn revert_payload(data: &Value) -> Option<Bytes> {
    let hex = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    hex.parse::<Bytes>().ok()
}

pub struct JsonRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;
        let resp: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ChainError::Malformed(format!("{method}: {e}")))?;

        if let Some(err) = resp.error {
            return Err(err.into_chain_error());
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    pub async fn client_version(&self) -> Result<String, ChainError> {
        let result = self.request("web3_clientVersion", json!([])).await?;
        Ok(result.as_str().unwrap_or("unknown").to_string())
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let result = self.request("eth_chainId", json!([])).await?;
        decode::<U64>(result, "eth_chainId").map(|id| id.to())
    }

    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        decode::<U128>(result, "eth_gasPrice").map(|price| price.to())
    }

    pub async fn transaction_count(&self, who: Address) -> Result<u64, ChainError> {
        let result = self
            .request("eth_getTransactionCount", json!([who, "pending"]))
            .await?;
        decode::<U64>(result, "eth_getTransactionCount").map(|n| n.to())
    }

    pub async fn estimate_gas(&self, from: Address, tx: &TxRequest) -> Result<u64, ChainError> {
        let result = self
            .request(
                "eth_estimateGas",
                json!([{ "from": from, "to": tx.to, "data": tx.data }]),
            )
            .await?;
        decode::<U64>(result, "eth_estimateGas").map(|gas| gas.to())
    }

    /// `eth_call` against `block` (`"latest"` or a hex block number).
    pub async fn call(
        &self,
        from: Address,
        tx: &TxRequest,
        block: Value,
    ) -> Result<Bytes, ChainError> {
        let result = self
            .request(
                "eth_call",
                json!([{ "from": from, "to": tx.to, "data": tx.data }, block]),
            )
            .await?;
        decode(result, "eth_call")
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ChainError> {
        let result = self
            .request("eth_sendRawTransaction", json!([Bytes::copy_from_slice(raw)]))
            .await?;
        decode(result, "eth_sendRawTransaction")
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>, ChainError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        parse_receipt(result)
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout {
            waiting_for: method.to_string(),
            after: None,
        }
    } else {
        ChainError::Transport(format!("{method}: {e}"))
    }
}

/// Decodes a JSON-RPC `result` into its alloy type (hex quantities,
/// hashes, byte strings, receipts).
fn decode<T: DeserializeOwned>(value: Value, method: &str) -> Result<T, ChainError> {
    serde_json::from_value(value).map_err(|e| ChainError::Malformed(format!("{method}: {e}")))
}

/// Only the receipt fields the keeper reads. Public RSK nodes omit some of
/// the fields a full Ethereum receipt requires.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    /// Absent on pre-Byzantium receipts; RSK always sets it.
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<Log>,
}

impl From<RpcReceipt> for Receipt {
    fn from(r: RpcReceipt) -> Self {
        Self {
            tx_hash: r.transaction_hash,
            block_number: r.block_number.to(),
            success: r.status.is_none_or(|status| status == U64::from(1)),
            logs: r
                .logs
                .into_iter()
                .map(|log| LogEntry {
                    address: log.address,
                    topics: log.data.topics().to_vec(),
                    data: log.data.data,
                })
                .collect(),
        }
    }
}

/// `eth_getTransactionReceipt` result; `null` while pending.
pub fn parse_receipt(value: Value) -> Result<Option<Receipt>, ChainError> {
    let receipt: Option<RpcReceipt> = decode(value, "eth_getTransactionReceipt")?;
    Ok(receipt.map(Receipt::from))
}
