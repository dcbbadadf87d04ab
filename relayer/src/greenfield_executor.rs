// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::GreenfieldConfig;
use crate::crypto::{RelayerAccountKey, RelayerBlsKey};
use crate::error::{RelayerError, RelayerResult};
use crate::greenfield_rpc::GreenfieldJsonRpcClient;
use crate::metrics::RelayerMetrics;
use crate::retry_with_max_elapsed_time;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fastcrypto::traits::{KeyPair, ToFromBytes};
use gnfd_relayer_types::{InturnRelayer, PoolVote, TxBroadcastResponse, ValidatorInfo};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const NEXT_BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The claim message submitted to the destination oracle module. Field order
/// is ABI-stable; do not reorder.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MsgClaim {
    pub from_address: String,
    pub src_chain_id: u32,
    pub dest_chain_id: u32,
    pub sequence: u64,
    pub timestamp: u64,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub vote_addr_set: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub agg_signature: Vec<u8>,
}

mod base64_bytes {
    use super::{Engine, BASE64};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }
}

#[derive(Serialize)]
struct StdFee<'a> {
    amount: u64,
    denom: &'a str,
    gas: u64,
}

#[derive(Serialize)]
struct SignDoc<'a> {
    chain_id: &'a str,
    fee: StdFee<'a>,
    msg: &'a MsgClaim,
    sequence: u64,
}

#[derive(Serialize)]
struct StdSignature<'a> {
    pub_key: &'a str,
    signature: &'a str,
    sequence: u64,
}

#[derive(Serialize)]
struct StdTx<'a> {
    msg: &'a MsgClaim,
    fee: StdFee<'a>,
    signatures: Vec<StdSignature<'a>>,
}

// Use a trait to abstract over the JSON-RPC client and the mock client for
// testing.
#[async_trait]
pub trait GreenfieldClientInner: Send + Sync {
    async fn latest_validators(&self) -> RelayerResult<Vec<ValidatorInfo>>;

    async fn inturn_relayer(&self) -> RelayerResult<InturnRelayer>;

    async fn account_nonce(&self, address: &str) -> RelayerResult<u64>;

    async fn latest_block_height(&self) -> RelayerResult<u64>;

    async fn broadcast_claim(&self, tx_bytes: Vec<u8>) -> RelayerResult<TxBroadcastResponse>;

    async fn query_votes(&self, event_type: u32, event_hash: &[u8])
        -> RelayerResult<Vec<PoolVote>>;

    async fn broadcast_vote(&self, vote: PoolVote) -> RelayerResult<bool>;
}

#[async_trait]
impl GreenfieldClientInner for GreenfieldJsonRpcClient {
    async fn latest_validators(&self) -> RelayerResult<Vec<ValidatorInfo>> {
        self.validators()
            .await
            .map_err(|e| RelayerError::Rpc(format!("validators: {e:#}")))
    }

    async fn inturn_relayer(&self) -> RelayerResult<InturnRelayer> {
        GreenfieldJsonRpcClient::inturn_relayer(self)
            .await
            .map_err(|e| RelayerError::Rpc(format!("inturn_relayer: {e:#}")))
    }

    async fn account_nonce(&self, address: &str) -> RelayerResult<u64> {
        GreenfieldJsonRpcClient::account_nonce(self, address)
            .await
            .map_err(|e| RelayerError::Rpc(format!("account_nonce: {e:#}")))
    }

    async fn latest_block_height(&self) -> RelayerResult<u64> {
        GreenfieldJsonRpcClient::latest_block_height(self)
            .await
            .map_err(|e| RelayerError::Rpc(format!("latest_block_height: {e:#}")))
    }

    async fn broadcast_claim(&self, tx_bytes: Vec<u8>) -> RelayerResult<TxBroadcastResponse> {
        self.broadcast_tx_sync(&tx_bytes)
            .await
            .map_err(|e| RelayerError::Rpc(format!("broadcast_tx_sync: {e:#}")))
    }

    async fn query_votes(
        &self,
        event_type: u32,
        event_hash: &[u8],
    ) -> RelayerResult<Vec<PoolVote>> {
        GreenfieldJsonRpcClient::query_votes(self, event_type, event_hash)
            .await
            .map_err(|e| RelayerError::Rpc(format!("query_vote: {e:#}")))
    }

    async fn broadcast_vote(&self, vote: PoolVote) -> RelayerResult<bool> {
        GreenfieldJsonRpcClient::broadcast_vote(self, &vote)
            .await
            .map_err(|e| RelayerError::Rpc(format!("broadcast_vote: {e:#}")))
    }
}

pub struct GreenfieldClient<P> {
    inner: P,
    account_key: RelayerAccountKey,
    bls_key: RelayerBlsKey,
    config: GreenfieldConfig,
    src_chain_id: u32,
    // Written by the refresh loop, read by the assembler. A snapshot one
    // refresh interval old is acceptable to callers.
    validators: RwLock<Vec<ValidatorInfo>>,
    metrics: Arc<RelayerMetrics>,
}

pub type GreenfieldExecutor = GreenfieldClient<GreenfieldJsonRpcClient>;

impl GreenfieldExecutor {
    pub fn build(
        config: GreenfieldConfig,
        src_chain_id: u32,
        account_key: RelayerAccountKey,
        bls_key: RelayerBlsKey,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        let inner = GreenfieldJsonRpcClient::new(config.rpc_url.clone());
        Self::new(inner, config, src_chain_id, account_key, bls_key, metrics)
    }
}

impl<P> GreenfieldClient<P>
where
    P: GreenfieldClientInner,
{
    pub fn new(
        inner: P,
        config: GreenfieldConfig,
        src_chain_id: u32,
        account_key: RelayerAccountKey,
        bls_key: RelayerBlsKey,
        metrics: Arc<RelayerMetrics>,
    ) -> Self {
        Self {
            inner,
            account_key,
            bls_key,
            config,
            src_chain_id,
            validators: RwLock::new(Vec::new()),
            metrics,
        }
    }

    /// This relayer's BLS identity, compared against the in-turn descriptor.
    pub fn bls_pubkey(&self) -> Vec<u8> {
        self.bls_key.public_bytes()
    }

    pub fn relayer_address(&self) -> &str {
        self.account_key.address()
    }

    pub async fn get_inturn_relayer(&self) -> RelayerResult<InturnRelayer> {
        self.inner.inturn_relayer().await
    }

    /// Cached validator snapshot. On a cold cache the first reader fetches
    /// synchronously so a claim is never aggregated against nothing.
    pub async fn cached_validators(&self) -> RelayerResult<Vec<ValidatorInfo>> {
        {
            let validators = self.validators.read().await;
            if !validators.is_empty() {
                return Ok(validators.clone());
            }
        }
        self.refresh_validators_once().await?;
        Ok(self.validators.read().await.clone())
    }

    /// Fetch the validator set and replace the cache.
    pub async fn refresh_validators_once(&self) -> RelayerResult<()> {
        let fresh = self.inner.latest_validators().await?;
        let mut validators = self.validators.write().await;
        *validators = fresh;
        Ok(())
    }

    // This function polls until the validator set is readable. A relayer
    // without a snapshot cannot aggregate anything, so startup waits the
    // destination out.
    pub async fn refresh_validators_until_success(&self) {
        loop {
            let Ok(Ok(())) = retry_with_max_elapsed_time!(
                self.refresh_validators_once(),
                Duration::from_secs(30)
            ) else {
                self.metrics.record_rpc_error("validators");
                error!("Failed to refresh greenfield validators");
                continue;
            };
            return;
        }
    }

    /// Background refresh; failures keep the previous snapshot.
    pub async fn update_cached_validators_loop(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("validator cache refresh loop shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_validators_once().await {
                        self.metrics.record_rpc_error("validators");
                        error!("update latest greenfield validators error, err={e}");
                    }
                }
            }
        }
    }

    pub async fn get_nonce(&self) -> RelayerResult<u64> {
        self.inner.account_nonce(self.account_key.address()).await
    }

    /// Wait for the destination to commit at least one more block, then
    /// re-read the account nonce. Used after a broadcast collision so a nonce
    /// another relayer consumed in the current block is never reused.
    pub async fn get_nonce_on_next_block(&self) -> RelayerResult<u64> {
        let observed = self.inner.latest_block_height().await?;
        loop {
            tokio::time::sleep(NEXT_BLOCK_POLL_INTERVAL).await;
            let current = self.inner.latest_block_height().await?;
            if current > observed {
                debug!("chain advanced {observed} -> {current}, re-reading nonce");
                return self.get_nonce().await;
            }
        }
    }

    /// Assemble, sign and broadcast one claim transaction. Returns the
    /// destination tx hash on acceptance.
    pub async fn claim_packages(
        &self,
        payload: &[u8],
        aggregated_signature: Vec<u8>,
        vote_addr_set: Vec<u8>,
        claim_ts: i64,
        oracle_sequence: u64,
        nonce: u64,
    ) -> RelayerResult<String> {
        let msg = MsgClaim {
            from_address: self.account_key.address().to_string(),
            src_chain_id: self.src_chain_id,
            dest_chain_id: self.config.chain_id,
            sequence: oracle_sequence,
            timestamp: claim_ts as u64,
            payload: payload.to_vec(),
            vote_addr_set,
            agg_signature: aggregated_signature,
        };
        let tx_bytes = self.sign_claim_tx(&msg, nonce)?;

        let response = self.inner.broadcast_claim(tx_bytes).await.map_err(|e| {
            self.metrics.err_claim_submission.inc();
            e
        })?;
        if !response.is_ok() {
            self.metrics.err_claim_submission.inc();
            return Err(RelayerError::ClaimBroadcast {
                code: response.code,
                raw_log: response.raw_log,
            });
        }
        self.metrics.claims_submitted.inc();
        Ok(response.tx_hash)
    }

    fn sign_claim_tx(&self, msg: &MsgClaim, nonce: u64) -> RelayerResult<Vec<u8>> {
        let fee = StdFee {
            amount: self.config.fee_amount,
            denom: &self.config.fee_denom,
            gas: self.config.gas_limit,
        };
        let sign_doc = SignDoc {
            chain_id: &self.config.chain_id_string,
            fee: StdFee {
                amount: self.config.fee_amount,
                denom: &self.config.fee_denom,
                gas: self.config.gas_limit,
            },
            msg,
            sequence: nonce,
        };
        let sign_bytes = serde_json::to_vec(&sign_doc)
            .map_err(|e| RelayerError::Generic(format!("failed to encode sign doc: {e}")))?;
        let signature = BASE64.encode(self.account_key.sign(&sign_bytes));
        let pub_key = BASE64.encode(self.account_key.keypair().public().as_bytes());

        let tx = StdTx {
            msg,
            fee,
            signatures: vec![StdSignature {
                pub_key: &pub_key,
                signature: &signature,
                sequence: nonce,
            }],
        };
        serde_json::to_vec(&tx)
            .map_err(|e| RelayerError::Generic(format!("failed to encode claim tx: {e}")))
    }

    pub async fn query_votes_by_event(
        &self,
        event_type: u32,
        event_hash: &[u8],
    ) -> RelayerResult<Vec<PoolVote>> {
        self.inner.query_votes(event_type, event_hash).await
    }

    pub async fn broadcast_vote(&self, vote: PoolVote) -> RelayerResult<bool> {
        self.inner.broadcast_vote(vote).await
    }
}
