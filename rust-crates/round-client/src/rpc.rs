//! Ethereum JSON-RPC adapter for the chain collaborators.
//!
//! Writes go through `eth_sendTransaction`, so the node (or the wallet proxy in
//! front of it) owns the signing key. Events are found by polling `eth_getLogs`.

use crate::{
    abi::{
        self,
        BigOrSmall,
    },
    chain::{
        ChainReader,
        EventWatcher,
        PendingTransaction,
        TransactionReceipt,
        TransactionRequest,
        TransactionSubmitter,
    },
    error::{
        ReadError,
        SubmissionError,
    },
    events::{
        EventBatch,
        EventSubscription,
    },
    round::RoundId,
};
use alloy_primitives::{
    Address,
    B256,
    Bytes,
    U64,
};
use alloy_sol_types::SolEvent;
use reqwest::StatusCode;
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    trace,
    warn,
};

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("node responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid {method} response: {reason}")]
    Decode {
        method: &'static str,
        reason: String,
    },
}

impl From<RpcError> for ReadError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Rpc { code, message } => ReadError::Rpc { code, message },
            RpcError::Decode { method, reason } => ReadError::Decode {
                context: method,
                reason,
            },
            other => ReadError::Transport(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptDto {
    transaction_hash: B256,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    status: Option<U64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogDto {
    topics: Vec<B256>,
    data: Bytes,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    transaction_hash: Option<B256>,
    #[serde(default)]
    removed: bool,
}

#[derive(Clone)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    contract: Address,
    account: Option<Address>,
    poll_interval: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(
        url: impl Into<String>,
        contract: Address,
        poll_interval: Duration,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            url: url.into(),
            http,
            contract,
            account: None,
            poll_interval,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to())
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let height: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(height.to())
    }

    /// Accounts the node can sign for.
    pub async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, id, "rpc request");
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let res = self.http.post(&self.url).json(&body).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(RpcError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let response: RpcResponse =
            serde_json::from_slice(&bytes).map_err(|e| RpcError::Decode {
                method,
                reason: e.to_string(),
            })?;
        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(response.result).map_err(|e| RpcError::Decode {
            method,
            reason: e.to_string(),
        })
    }

    /// Fetches `Revealed` logs from `cursor` up to the chain head and advances
    /// the cursor past the head. The first call only pins the cursor to the
    /// current head.
    async fn poll_revealed(
        &self,
        round: Option<RoundId>,
        cursor: &mut Option<u64>,
    ) -> Result<EventBatch, RpcError> {
        let head = self.block_number().await?;
        let from = *cursor.get_or_insert(head);
        if from > head {
            return Ok(Vec::new());
        }
        let mut topics = vec![json!(BigOrSmall::Revealed::SIGNATURE_HASH)];
        if let Some(id) = round {
            topics.push(json!(id.as_b256()));
        }
        let filter = json!({
            "address": self.contract,
            "topics": topics,
            "fromBlock": quantity(from),
            "toBlock": quantity(head),
        });
        let logs: Vec<LogDto> = self.request("eth_getLogs", json!([filter])).await?;
        *cursor = Some(head + 1);
        Ok(decode_logs(logs))
    }
}

fn quantity(value: u64) -> String {
    format!("{value:#x}")
}

fn decode_logs(logs: Vec<LogDto>) -> EventBatch {
    let mut batch = Vec::new();
    for log in logs {
        if log.removed {
            debug!(tx = ?log.transaction_hash, "skipping log removed by a reorg");
            continue;
        }
        match abi::decode_revealed(log.topics, log.data) {
            Ok(Some(mut event)) => {
                event.block_number = log.block_number.map(|n| n.to());
                event.tx_hash = log.transaction_hash;
                batch.push(event);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(tx = ?log.transaction_hash, error = %err, "skipping undecodable Revealed log");
            }
        }
    }
    batch
}

async fn revealed_poller(
    client: RpcClient,
    round: Option<RoundId>,
    sender: mpsc::UnboundedSender<EventBatch>,
) {
    let mut ticker = time::interval(client.poll_interval);
    let mut cursor = None;
    loop {
        ticker.tick().await;
        if sender.is_closed() {
            break;
        }
        match client.poll_revealed(round, &mut cursor).await {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                debug!(count = batch.len(), "delivering Revealed batch");
                if sender.send(batch).is_err() {
                    break;
                }
            }
            Err(err) => warn!(error = %err, "Revealed log poll failed"),
        }
    }
    debug!("Revealed poller stopped");
}

impl ChainReader for RpcClient {
    async fn call(&self, calldata: Bytes) -> Result<Bytes, ReadError> {
        let params = json!([{ "to": self.contract, "data": calldata }, "latest"]);
        Ok(self.request("eth_call", params).await?)
    }
}

pub struct RpcPendingTransaction {
    client: RpcClient,
    hash: B256,
}

impl PendingTransaction for RpcPendingTransaction {
    fn tx_hash(&self) -> B256 {
        self.hash
    }

    async fn await_confirmation(self) -> Result<TransactionReceipt, SubmissionError> {
        let mut ticker = time::interval(self.client.poll_interval);
        loop {
            ticker.tick().await;
            let receipt: Option<ReceiptDto> = match self
                .client
                .request("eth_getTransactionReceipt", json!([self.hash]))
                .await
            {
                Ok(receipt) => receipt,
                Err(err @ (RpcError::Transport(_) | RpcError::Status { .. })) => {
                    warn!(tx = %self.hash, error = %err, "receipt poll failed; retrying");
                    continue;
                }
                Err(err) => {
                    return Err(SubmissionError::ConfirmationFailed(err.to_string()));
                }
            };
            let Some(receipt) = receipt else {
                trace!(tx = %self.hash, "transaction not mined yet");
                continue;
            };
            if receipt.status == Some(U64::ZERO) {
                return Err(SubmissionError::Reverted(receipt.transaction_hash));
            }
            return Ok(TransactionReceipt {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number.map(|n| n.to()),
            });
        }
    }
}

impl TransactionSubmitter for RpcClient {
    type Pending = RpcPendingTransaction;

    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn submit(
        &self,
        request: TransactionRequest,
    ) -> Result<RpcPendingTransaction, SubmissionError> {
        let from = self
            .account
            .ok_or_else(|| SubmissionError::Rejected("no sender account".to_string()))?;
        let tx = json!({
            "from": from,
            "to": self.contract,
            "data": request.data,
            "value": request.value,
        });
        let hash: B256 = self
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| SubmissionError::Rejected(e.to_string()))?;
        debug!(tx = %hash, "transaction sent");
        Ok(RpcPendingTransaction {
            client: self.clone(),
            hash,
        })
    }
}

impl EventWatcher for RpcClient {
    fn watch_revealed(
        &self,
        round: Option<RoundId>,
    ) -> Result<EventSubscription, ReadError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReadError::Transport(format!("no async runtime: {e}")))?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = runtime.spawn(revealed_poller(self.clone(), round, sender));
        Ok(EventSubscription::new(receiver, handle))
    }
}
