use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, U64};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{Ledger, LedgerLog, LogFilter};
use crate::{
    error::{VaultError, VaultResult},
    http_request::Request,
};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// A [`Ledger`] backed by an Ethereum JSON-RPC endpoint.
#[derive(Debug)]
pub struct JsonRpcLedger {
    rpc_url: String,
    request: Request,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Creates a client for the node at `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            request: Request::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> VaultResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::trace!("json-rpc {method} #{id}");
        let response = self
            .request
            .handle(self.request.post(&self.rpc_url)?.json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(VaultError::NetworkError {
                url: self.rpc_url.clone(),
                status: Some(status.as_u16()),
                error,
            });
        }

        let response: RpcResponse<T> = response.json().await?;
        if let Some(error) = response.error {
            return Err(VaultError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or_else(|| VaultError::SerializationError {
            error: format!("{method} returned neither result nor error"),
        })
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn get_logs(&self, filter: &LogFilter) -> VaultResult<Vec<LedgerLog>> {
        let params = json!([{
            "address": filter.address,
            "topics": filter.topics,
            "fromBlock": "earliest",
            "toBlock": "latest",
        }]);
        self.rpc("eth_getLogs", params).await
    }

    async fn call(&self, to: Address, input: Bytes) -> VaultResult<Bytes> {
        let params = json!([{ "to": to, "data": input }, "latest"]);
        self.rpc("eth_call", params).await
    }

    async fn chain_id(&self) -> VaultResult<u64> {
        let chain_id: U64 = self.rpc("eth_chainId", json!([])).await?;
        Ok(chain_id.to::<u64>())
    }
}
