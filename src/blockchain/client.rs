//! Ledger JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Query transaction effects (created objects) by digest
//! - Query coin balances and coin objects for an owner
//! - Handle timeouts and network errors, falling over to secondary endpoints
//! - Provide health check for ledger connectivity

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{
    Address, BlockchainError, BlockchainResult, CreatedObject, ObjectId, TxDigest,
};
use crate::config::ChainConfig;
use crate::observability::metrics;

/// A coin object and its balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinInfo {
    pub coin_object_id: ObjectId,
    pub balance: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectChange {
    #[serde(rename = "type")]
    kind: String,
    object_id: Option<String>,
    object_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxBlock {
    #[serde(default)]
    object_changes: Vec<ObjectChange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResult {
    total_balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinEntry {
    coin_object_id: String,
    balance: String,
}

/// Ledger RPC client wrapper with failover support.
#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    /// Primary endpoint first, then failovers.
    endpoints: Vec<url::Url>,
    timeout_duration: Duration,
}

impl LedgerClient {
    /// Create a new ledger client.
    ///
    /// Invalid failover URLs are skipped; an invalid primary URL is an error.
    pub fn new(config: &ChainConfig) -> BlockchainResult<Self> {
        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut endpoints = vec![primary];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = endpoints.len() - 1,
            "Ledger client initialized"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoints,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        })
    }

    /// Issue a JSON-RPC call, trying each endpoint in order.
    ///
    /// Transport failures and timeouts fall over to the next endpoint; an
    /// error returned by the node itself is final.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> BlockchainResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let fut = self.http.post(endpoint.clone()).json(&body).send();
            let response = match timeout(self.timeout_duration, fut).await {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                    continue;
                }
            };

            let parsed: RpcResponse = match response.json().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "Malformed RPC response");
                    continue;
                }
            };

            if let Some(err) = parsed.error {
                let lowered = err.message.to_lowercase();
                if lowered.contains("not find") || lowered.contains("not found") {
                    return Err(BlockchainError::NotFound(err.message));
                }
                return Err(BlockchainError::Rpc(format!("{} (code {})", err.message, err.code)));
            }

            let result = parsed
                .result
                .ok_or_else(|| BlockchainError::Rpc("RPC response without result".to_string()))?;
            return serde_json::from_value(result)
                .map_err(|e| BlockchainError::Serialization(e.to_string()));
        }

        Err(BlockchainError::Rpc("All RPC providers failed".to_string()))
    }

    /// Objects created by an executed transaction.
    pub async fn get_created_objects(&self, digest: &TxDigest) -> BlockchainResult<Vec<CreatedObject>> {
        let block: TxBlock = self
            .call(
                "sui_getTransactionBlock",
                json!([digest.0, { "showObjectChanges": true }]),
            )
            .await?;

        let mut created = Vec::new();
        for change in block.object_changes {
            if change.kind != "created" {
                continue;
            }
            let Some(raw_id) = change.object_id else { continue };
            let object_id = ObjectId::from_str(&raw_id)?;
            created.push(CreatedObject {
                object_id,
                object_type: change.object_type,
            });
        }
        Ok(created)
    }

    /// Total balance of `coin_type` owned by `owner`.
    pub async fn get_balance(&self, owner: &Address, coin_type: &str) -> BlockchainResult<u64> {
        let result: BalanceResult = self
            .call("suix_getBalance", json!([owner.to_string(), coin_type]))
            .await?;
        result
            .total_balance
            .parse()
            .map_err(|e| BlockchainError::Serialization(format!("balance: {}", e)))
    }

    /// Coin objects of `coin_type` owned by `owner` (first page).
    pub async fn get_coins(&self, owner: &Address, coin_type: &str) -> BlockchainResult<Vec<CoinInfo>> {
        let page: CoinPage = self
            .call("suix_getCoins", json!([owner.to_string(), coin_type, null, null]))
            .await?;
        page.data
            .into_iter()
            .map(|c| {
                Ok(CoinInfo {
                    coin_object_id: ObjectId::from_str(&c.coin_object_id)?,
                    balance: c
                        .balance
                        .parse()
                        .map_err(|e| BlockchainError::Serialization(format!("coin balance: {}", e)))?,
                })
            })
            .collect()
    }

    /// Check if the ledger is reachable.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self
            .call::<Value>("sui_getLatestCheckpointSequenceNumber", json!([]))
            .await
            .is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("endpoints", &self.endpoints.len())
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

/// Pick the smallest coin that covers `amount`.
pub fn select_coin(coins: &[CoinInfo], amount: u64) -> Option<&CoinInfo> {
    coins
        .iter()
        .filter(|c| c.balance >= amount)
        .min_by_key(|c| c.balance)
}
