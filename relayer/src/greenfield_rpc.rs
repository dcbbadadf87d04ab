// Simple async JSON-RPC client for a Greenfield (Tendermint-style) fullnode.
// Covers the consensus queries, the vote-pool methods and transaction
// broadcast that the relay pipeline needs. Uses HTTP JSON-RPC (default
// port 26657).

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gnfd_relayer_types::{InturnRelayer, PoolVote, TxBroadcastResponse, ValidatorInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

const VOTE_POOL_QUERY_METHOD: &str = "query_vote";
const VOTE_POOL_BROADCAST_METHOD: &str = "broadcast_vote";
const INTURN_RELAYER_QUERY_PATH: &str = "custom/oracle/inturn-relayer";

#[derive(Clone, Debug)]
pub struct GreenfieldJsonRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: std::sync::Arc<AtomicU64>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl GreenfieldJsonRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        fn shared_http_client() -> reqwest::Client {
            static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
            CLIENT
                .get_or_init(|| {
                    reqwest::Client::builder()
                        .pool_max_idle_per_host(16)
                        .tcp_keepalive(Some(Duration::from_secs(30)))
                        .connect_timeout(Duration::from_secs(2))
                        .timeout(Duration::from_secs(30))
                        .build()
                        .expect("Failed to build reqwest client")
                })
                .clone()
        }

        Self {
            http_client: shared_http_client(),
            rpc_url: rpc_url.into(),
            request_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        };

        fn is_transient_transport_error(err: &reqwest::Error) -> bool {
            if err.is_connect() || err.is_timeout() {
                return true;
            }
            let msg = err.to_string().to_lowercase();
            msg.contains("connection closed")
                || msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("unexpected eof")
        }

        let max_attempts: usize = 3;
        let mut last_transport_err: Option<anyhow::Error> = None;

        for attempt in 0..max_attempts {
            let response = match self
                .http_client
                .post(&self.rpc_url)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 < max_attempts && is_transient_transport_error(&err) {
                        last_transport_err = Some(anyhow!(err));
                        tracing::warn!(
                            "transport error calling {} (attempt {}/{}), retrying",
                            method,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(anyhow!(err));
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("HTTP error: {status} - {error_text}"));
            }

            let parsed: JsonRpcResponse = response.json().await?;
            if let Some(err) = parsed.error {
                return Err(anyhow!("RPC error {}: {}", err.code, err.message));
            }
            return parsed
                .result
                .ok_or_else(|| anyhow!("RPC response for {method} carried no result"));
        }

        Err(last_transport_err.unwrap_or_else(|| anyhow!("{method} failed with no response")))
    }

    /// Current validator set in consensus order. The order is load-bearing:
    /// claim bitsets index into it.
    pub async fn validators(&self) -> Result<Vec<ValidatorInfo>> {
        // Validator sets here are small; one page covers them.
        let result = self
            .call("validators", json!({ "per_page": "100" }))
            .await?;
        let raw = result
            .get("validators")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("validators response missing validator list"))?;

        raw.iter().map(parse_validator).collect()
    }

    /// Latest committed block height from node status.
    pub async fn latest_block_height(&self) -> Result<u64> {
        let result = self.call("status", json!({})).await?;
        let height = result
            .get("sync_info")
            .and_then(|s| s.get("latest_block_height"))
            .and_then(|h| h.as_str())
            .ok_or_else(|| anyhow!("status response missing latest_block_height"))?;
        Ok(height.parse()?)
    }

    /// The oracle module's current in-turn relayer designation.
    pub async fn inturn_relayer(&self) -> Result<InturnRelayer> {
        let value = self.abci_query(INTURN_RELAYER_QUERY_PATH, &[]).await?;
        let bls_pub_key = value
            .get("bls_pub_key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("in-turn relayer response missing bls_pub_key"))?
            .to_string();
        let interval = value
            .get("relay_interval")
            .ok_or_else(|| anyhow!("in-turn relayer response missing relay_interval"))?;
        Ok(InturnRelayer {
            bls_pub_key,
            relay_interval: gnfd_relayer_types::RelayInterval {
                start: parse_u64_field(interval, "start")?,
                end: parse_u64_field(interval, "end")?,
            },
        })
    }

    /// Account sequence (tx nonce) for an address.
    pub async fn account_nonce(&self, address: &str) -> Result<u64> {
        let path = format!("custom/auth/account/{address}");
        let value = self.abci_query(&path, &[]).await?;
        parse_u64_field(&value, "sequence")
    }

    pub async fn broadcast_tx_sync(&self, tx_bytes: &[u8]) -> Result<TxBroadcastResponse> {
        let result = self
            .call("broadcast_tx_sync", json!({ "tx": BASE64.encode(tx_bytes) }))
            .await?;
        let code = result.get("code").and_then(|c| c.as_u64()).unwrap_or(0) as u32;
        let tx_hash = result
            .get("hash")
            .and_then(|h| h.as_str())
            .unwrap_or_default()
            .to_string();
        let raw_log = result
            .get("log")
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(TxBroadcastResponse {
            code,
            tx_hash,
            raw_log,
        })
    }

    /// Vote-pool query keyed by `(event_type, event_hash)`.
    pub async fn query_votes(&self, event_type: u32, event_hash: &[u8]) -> Result<Vec<PoolVote>> {
        let result = self
            .call(
                VOTE_POOL_QUERY_METHOD,
                json!({
                    "event_type": event_type,
                    "event_hash": BASE64.encode(event_hash),
                }),
            )
            .await?;
        let votes = result
            .get("votes")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![]));
        Ok(serde_json::from_value(votes)?)
    }

    /// Submit one vote to the pool. Returns whether the node accepted it.
    pub async fn broadcast_vote(&self, vote: &PoolVote) -> Result<bool> {
        let result = self
            .call(VOTE_POOL_BROADCAST_METHOD, json!({ "vote": vote }))
            .await?;
        // An empty result object is an accept; an error would have surfaced
        // through the JSON-RPC error field.
        Ok(result.get("success").and_then(|v| v.as_bool()).unwrap_or(true))
    }

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<Value> {
        let result = self
            .call(
                "abci_query",
                json!({
                    "path": path,
                    "data": hex::encode(data),
                    "prove": false,
                }),
            )
            .await?;
        let response = result
            .get("response")
            .ok_or_else(|| anyhow!("abci_query result missing response"))?;
        let code = response.get("code").and_then(|c| c.as_u64()).unwrap_or(0);
        if code != 0 {
            let log = response
                .get("log")
                .and_then(|l| l.as_str())
                .unwrap_or_default();
            return Err(anyhow!("abci_query {path} failed, code={code}, log={log}"));
        }
        let value = response
            .get("value")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("abci_query {path} returned no value"))?;
        let decoded = BASE64.decode(value)?;
        Ok(serde_json::from_slice(&decoded)?)
    }
}

fn parse_validator(value: &Value) -> Result<ValidatorInfo> {
    // Greenfield extends the Tendermint validator with a BLS key and a
    // relayer account address.
    let bls_key = value
        .get("bls_key")
        .and_then(|k| k.as_str())
        .ok_or_else(|| anyhow!("validator entry missing bls_key"))?;
    let voting_power = value
        .get("voting_power")
        .and_then(|p| p.as_str())
        .ok_or_else(|| anyhow!("validator entry missing voting_power"))?
        .parse()?;
    let relayer_address = value
        .get("relayer_address")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(ValidatorInfo {
        bls_pubkey: BASE64.decode(bls_key)?,
        voting_power,
        relayer_address,
    })
}

fn parse_u64_field(value: &Value, field: &str) -> Result<u64> {
    let field_value = value
        .get(field)
        .ok_or_else(|| anyhow!("response missing field {field}"))?;
    // Tendermint renders integers as strings; accept both.
    if let Some(n) = field_value.as_u64() {
        return Ok(n);
    }
    field_value
        .as_str()
        .ok_or_else(|| anyhow!("field {field} is neither integer nor string"))?
        .parse()
        .map_err(|e| anyhow!("field {field} failed to parse: {e}"))
}
