// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mock clients and fixtures for pipeline tests. No network, no database.

use crate::assembler::{BscAssembler, Clock};
use crate::bsc_executor::{BscClient, BscClientInner};
use crate::config::GreenfieldConfig;
use crate::crypto::{RelayerAccountKey, RelayerBlsKey};
use crate::error::{RelayerError, RelayerResult};
use crate::greenfield_executor::{GreenfieldClient, GreenfieldClientInner};
use crate::metrics::RelayerMetrics;
use crate::retry::RetryPolicy;
use crate::storage::SequenceStore;
use async_trait::async_trait;
use fastcrypto::bls12381::min_pk::BLS12381KeyPair;
use fastcrypto::traits::{KeyPair, ToFromBytes};
use gnfd_relayer_types::{
    ChannelId, InturnRelayer, PackageStatus, PackageVote, PoolVote, RelayPackage,
    TxBroadcastResponse, ValidatorInfo, ORACLE_CHANNEL_ID,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_BSC_CHAIN_ID: u32 = 97;
pub const TEST_GREENFIELD_CHAIN_ID: u32 = 5600;

/// Deterministic account key for tests.
pub fn test_account_key() -> RelayerAccountKey {
    RelayerAccountKey::from_hex("e42c82337ce12d4a7ad6cd65876d91b2ab6594fd50cdab1737c91773ba7451db")
}

/// Deterministic BLS key derived from a one-byte seed.
pub fn test_bls_key(seed: u8) -> RelayerBlsKey {
    let mut rng = StdRng::from_seed([seed; 32]);
    let keypair = BLS12381KeyPair::generate(&mut rng);
    RelayerBlsKey::from_hex(&hex::encode(keypair.private().as_bytes()))
}

pub fn test_greenfield_config() -> GreenfieldConfig {
    GreenfieldConfig {
        rpc_url: "http://localhost:26657".into(),
        chain_id: TEST_GREENFIELD_CHAIN_ID,
        chain_id_string: "greenfield_5600-1".into(),
        gas_limit: 1_000,
        fee_amount: 1_000_000_000_000,
        fee_denom: "BNB".into(),
        account_key: crate::config::SecretSource::Hex { hex: "ab".into() },
        bls_key: crate::config::SecretSource::Hex { hex: "cd".into() },
    }
}

/// Validator set plus the keys able to vote for it.
pub fn test_validators(seeds: &[u8]) -> (Vec<ValidatorInfo>, Vec<RelayerBlsKey>) {
    let keys: Vec<RelayerBlsKey> = seeds.iter().map(|&s| test_bls_key(s)).collect();
    let validators = keys
        .iter()
        .enumerate()
        .map(|(i, key)| ValidatorInfo {
            bls_pubkey: key.public_bytes(),
            voting_power: 1_000,
            relayer_address: format!("0x{:040x}", i + 1),
        })
        .collect();
    (validators, keys)
}

pub fn test_package(sequence: u64, status: PackageStatus, tx_time: i64) -> RelayPackage {
    RelayPackage {
        id: sequence as i64,
        channel_id: ORACLE_CHANNEL_ID,
        oracle_sequence: sequence,
        package_sequence: 0,
        height: 3_000 + sequence,
        tx_time,
        status,
        claim_payload: format!("payload-{sequence}").into_bytes(),
        claimed_tx_hash: None,
    }
}

pub fn votes_for(package: &RelayPackage, keys: &[RelayerBlsKey]) -> Vec<PackageVote> {
    keys.iter()
        .map(|key| PackageVote {
            channel_id: package.channel_id,
            oracle_sequence: package.oracle_sequence,
            pubkey: key.public_bytes(),
            signature: key.sign(&package.claim_payload).as_bytes().to_vec(),
            claim_payload: package.claim_payload.clone(),
        })
        .collect()
}

/// Settable wall clock.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Mock sequence store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSequenceStore {
    packages: Mutex<BTreeMap<u64, Vec<RelayPackage>>>,
    votes: Mutex<HashMap<(ChannelId, u64), Vec<PackageVote>>>,
    status_updates: Mutex<Vec<(Vec<i64>, PackageStatus, String)>>,
    hash_updates: Mutex<Vec<(Vec<i64>, String)>>,
}

impl MockSequenceStore {
    pub fn add_package(&self, package: RelayPackage, keys: &[RelayerBlsKey]) {
        self.votes
            .lock()
            .unwrap()
            .insert(
                (package.channel_id, package.oracle_sequence),
                votes_for(&package, keys),
            );
        self.packages
            .lock()
            .unwrap()
            .entry(package.oracle_sequence)
            .or_default()
            .push(package);
    }

    pub fn status_updates(&self) -> Vec<(Vec<i64>, PackageStatus, String)> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn hash_updates(&self) -> Vec<(Vec<i64>, String)> {
        self.hash_updates.lock().unwrap().clone()
    }

    pub fn package_status(&self, sequence: u64) -> Option<PackageStatus> {
        self.packages
            .lock()
            .unwrap()
            .get(&sequence)
            .and_then(|pkgs| pkgs.first())
            .map(|p| p.status)
    }
}

#[async_trait]
impl SequenceStore for MockSequenceStore {
    async fn packages_by_oracle_sequence(&self, sequence: u64) -> RelayerResult<Vec<RelayPackage>> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .get(&sequence)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_oracle_sequence_by_status(&self, status: PackageStatus) -> RelayerResult<i64> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, pkgs)| pkgs.iter().all(|p| p.status == status))
            .map(|(seq, _)| *seq as i64)
            .max()
            .unwrap_or(-1))
    }

    async fn votes_by_channel_and_sequence(
        &self,
        channel_id: ChannelId,
        sequence: u64,
    ) -> RelayerResult<Vec<PackageVote>> {
        Ok(self
            .votes
            .lock()
            .unwrap()
            .get(&(channel_id, sequence))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_batch_status_and_claimed_tx_hash(
        &self,
        ids: &[i64],
        status: PackageStatus,
        tx_hash: &str,
    ) -> RelayerResult<()> {
        self.status_updates
            .lock()
            .unwrap()
            .push((ids.to_vec(), status, tx_hash.to_string()));
        let mut packages = self.packages.lock().unwrap();
        for pkgs in packages.values_mut() {
            for pkg in pkgs.iter_mut() {
                if ids.contains(&pkg.id) {
                    pkg.status = status;
                    pkg.claimed_tx_hash = Some(tx_hash.to_string());
                }
            }
        }
        Ok(())
    }

    async fn update_batch_claimed_tx_hash(&self, ids: &[i64], tx_hash: &str) -> RelayerResult<()> {
        self.hash_updates
            .lock()
            .unwrap()
            .push((ids.to_vec(), tx_hash.to_string()));
        let mut packages = self.packages.lock().unwrap();
        for pkgs in packages.values_mut() {
            for pkg in pkgs.iter_mut() {
                if ids.contains(&pkg.id) {
                    pkg.claimed_tx_hash = Some(tx_hash.to_string());
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock Greenfield client
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockGreenfieldState {
    validators: Mutex<Vec<ValidatorInfo>>,
    validator_fetches: AtomicU64,
    fail_validator_queries: AtomicU32,
    inturn: Mutex<Option<InturnRelayer>>,
    nonce: AtomicU64,
    nonce_queue: Mutex<VecDeque<u64>>,
    height: AtomicU64,
    advance_height_per_poll: AtomicBool,
    claim_queue: Mutex<VecDeque<RelayerResult<TxBroadcastResponse>>>,
    wildcard_claim: Mutex<Option<TxBroadcastResponse>>,
    broadcast_txs: Mutex<Vec<serde_json::Value>>,
    pool_votes: Mutex<Vec<PoolVote>>,
    broadcast_pool_votes: Mutex<Vec<PoolVote>>,
}

// Mock client used in test environments.
#[derive(Clone, Default)]
pub struct MockGreenfieldClient {
    state: Arc<MockGreenfieldState>,
}

impl MockGreenfieldClient {
    pub fn set_validators(&self, validators: Vec<ValidatorInfo>) {
        *self.state.validators.lock().unwrap() = validators;
    }

    pub fn validator_fetches(&self) -> u64 {
        self.state.validator_fetches.load(Ordering::SeqCst)
    }

    /// Make the next `count` validator queries fail.
    pub fn fail_validator_queries(&self, count: u32) {
        self.state
            .fail_validator_queries
            .store(count, Ordering::SeqCst);
    }

    pub fn set_inturn_relayer(&self, inturn: InturnRelayer) {
        *self.state.inturn.lock().unwrap() = Some(inturn);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state.nonce.store(nonce, Ordering::SeqCst);
    }

    /// Queue a one-shot nonce answer ahead of the standing value.
    pub fn push_nonce(&self, nonce: u64) {
        self.state.nonce_queue.lock().unwrap().push_back(nonce);
    }

    pub fn set_latest_block_height(&self, height: u64) {
        self.state.height.store(height, Ordering::SeqCst);
    }

    /// Make every height poll observe a new block, so
    /// `get_nonce_on_next_block` completes after one sleep.
    pub fn advance_height_per_poll(&self) {
        self.state
            .advance_height_per_poll
            .store(true, Ordering::SeqCst);
    }

    /// Queue one claim outcome; once the queue drains the wildcard (or an
    /// accepting default) answers.
    pub fn push_claim_response(&self, response: RelayerResult<TxBroadcastResponse>) {
        self.state.claim_queue.lock().unwrap().push_back(response);
    }

    pub fn set_claim_response(&self, response: TxBroadcastResponse) {
        *self.state.wildcard_claim.lock().unwrap() = Some(response);
    }

    pub fn broadcast_count(&self) -> usize {
        self.state.broadcast_txs.lock().unwrap().len()
    }

    /// Broadcast claim transactions as parsed JSON, in submission order.
    pub fn broadcast_txs(&self) -> Vec<serde_json::Value> {
        self.state.broadcast_txs.lock().unwrap().clone()
    }

    /// The `(sequence, nonce)` pairs of every submitted claim.
    pub fn submitted_claims(&self) -> Vec<(u64, u64)> {
        self.broadcast_txs()
            .iter()
            .map(|tx| {
                let sequence = tx["msg"]["sequence"].as_u64().unwrap();
                let nonce = tx["signatures"][0]["sequence"].as_u64().unwrap();
                (sequence, nonce)
            })
            .collect()
    }

    pub fn set_pool_votes(&self, votes: Vec<PoolVote>) {
        *self.state.pool_votes.lock().unwrap() = votes;
    }

    pub fn broadcast_pool_votes(&self) -> Vec<PoolVote> {
        self.state.broadcast_pool_votes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GreenfieldClientInner for MockGreenfieldClient {
    async fn latest_validators(&self) -> RelayerResult<Vec<ValidatorInfo>> {
        self.state.validator_fetches.fetch_add(1, Ordering::SeqCst);
        let failures = self.state.fail_validator_queries.load(Ordering::SeqCst);
        if failures > 0 {
            self.state
                .fail_validator_queries
                .store(failures - 1, Ordering::SeqCst);
            return Err(RelayerError::TransientRpc("mock validator query down".into()));
        }
        Ok(self.state.validators.lock().unwrap().clone())
    }

    async fn inturn_relayer(&self) -> RelayerResult<InturnRelayer> {
        self.state
            .inturn
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RelayerError::Rpc("in-turn relayer not configured in mock".into()))
    }

    async fn account_nonce(&self, _address: &str) -> RelayerResult<u64> {
        if let Some(queued) = self.state.nonce_queue.lock().unwrap().pop_front() {
            return Ok(queued);
        }
        Ok(self.state.nonce.load(Ordering::SeqCst))
    }

    async fn latest_block_height(&self) -> RelayerResult<u64> {
        if self.state.advance_height_per_poll.load(Ordering::SeqCst) {
            return Ok(self.state.height.fetch_add(1, Ordering::SeqCst));
        }
        Ok(self.state.height.load(Ordering::SeqCst))
    }

    async fn broadcast_claim(&self, tx_bytes: Vec<u8>) -> RelayerResult<TxBroadcastResponse> {
        let parsed: serde_json::Value = serde_json::from_slice(&tx_bytes)
            .map_err(|e| RelayerError::Generic(format!("mock received unparseable tx: {e}")))?;
        self.state.broadcast_txs.lock().unwrap().push(parsed);

        if let Some(queued) = self.state.claim_queue.lock().unwrap().pop_front() {
            return queued;
        }
        if let Some(wildcard) = self.state.wildcard_claim.lock().unwrap().clone() {
            return Ok(wildcard);
        }
        Ok(TxBroadcastResponse {
            code: 0,
            tx_hash: format!("0xHASH{}", self.broadcast_count()),
            raw_log: String::new(),
        })
    }

    async fn query_votes(
        &self,
        event_type: u32,
        event_hash: &[u8],
    ) -> RelayerResult<Vec<PoolVote>> {
        Ok(self
            .state
            .pool_votes
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.event_type == event_type && v.event_hash == event_hash)
            .cloned()
            .collect())
    }

    async fn broadcast_vote(&self, vote: PoolVote) -> RelayerResult<bool> {
        self.state.broadcast_pool_votes.lock().unwrap().push(vote);
        Ok(true)
    }
}

/// Greenfield client over the mock inner, with deterministic keys.
pub fn test_greenfield_client(
    mock: MockGreenfieldClient,
) -> GreenfieldClient<MockGreenfieldClient> {
    GreenfieldClient::new(
        mock,
        test_greenfield_config(),
        TEST_BSC_CHAIN_ID,
        test_account_key(),
        test_bls_key(200),
        Arc::new(RelayerMetrics::new_for_testing()),
    )
}

// ---------------------------------------------------------------------------
// Mock BSC client
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockBscState {
    next_delivery: AtomicU64,
    send_sequence: AtomicU64,
    fail_delivery: AtomicU32,
    fail_send: AtomicU32,
    delivery_queries: AtomicU64,
}

#[derive(Clone, Default)]
pub struct MockBscClient {
    state: Arc<MockBscState>,
}

impl MockBscClient {
    pub fn set_next_delivery_sequence(&self, sequence: u64) {
        self.state.next_delivery.store(sequence, Ordering::SeqCst);
    }

    pub fn set_send_sequence(&self, sequence: u64) {
        self.state.send_sequence.store(sequence, Ordering::SeqCst);
    }

    pub fn fail_next_delivery_queries(&self, count: u32) {
        self.state.fail_delivery.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_send_queries(&self, count: u32) {
        self.state.fail_send.store(count, Ordering::SeqCst);
    }

    pub fn delivery_query_count(&self) -> u64 {
        self.state.delivery_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BscClientInner for MockBscClient {
    async fn next_deliverable_oracle_sequence(&self, _chain_id: u32) -> RelayerResult<u64> {
        self.state.delivery_queries.fetch_add(1, Ordering::SeqCst);
        let failures = self.state.fail_delivery.load(Ordering::SeqCst);
        if failures > 0 {
            self.state.fail_delivery.store(failures - 1, Ordering::SeqCst);
            return Err(RelayerError::TransientRpc("mock delivery query down".into()));
        }
        Ok(self.state.next_delivery.load(Ordering::SeqCst))
    }

    async fn channel_send_sequence(&self, _channel_id: ChannelId) -> RelayerResult<u64> {
        let failures = self.state.fail_send.load(Ordering::SeqCst);
        if failures > 0 {
            self.state.fail_send.store(failures - 1, Ordering::SeqCst);
            return Err(RelayerError::TransientRpc("mock send query down".into()));
        }
        Ok(self.state.send_sequence.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Assembler harness
// ---------------------------------------------------------------------------

pub struct AssemblerHarness {
    pub assembler: BscAssembler<MockSequenceStore, MockBscClient, MockGreenfieldClient>,
    pub store: Arc<MockSequenceStore>,
    pub bsc: MockBscClient,
    pub greenfield: MockGreenfieldClient,
    pub clock: Arc<ManualClock>,
    pub metrics: Arc<RelayerMetrics>,
    pub own_bls_key: RelayerBlsKey,
}

/// Build an assembler wired to mocks. `own_seed` fixes this process's BLS
/// identity so tests choose whether the in-turn descriptor matches it.
pub fn assembler_harness(own_seed: u8, now: i64) -> AssemblerHarness {
    let store = Arc::new(MockSequenceStore::default());
    let bsc_mock = MockBscClient::default();
    let greenfield_mock = MockGreenfieldClient::default();
    let clock = ManualClock::new(now);
    let metrics = Arc::new(RelayerMetrics::new_for_testing());
    let own_bls_key = test_bls_key(own_seed);

    let relay_config = crate::config::RelayConfig {
        assemble_interval_ms: 100,
        greenfield_sequence_update_latency_secs: 30,
        bsc_to_greenfield_inturn_relayer_timeout_secs: 120,
        tx_delay_alert_threshold_secs: 300,
        retry_attempts: 3,
        retry_delay_ms: 10,
        update_cached_validators_interval_secs: 60,
    };

    let greenfield = Arc::new(GreenfieldClient::new(
        greenfield_mock.clone(),
        test_greenfield_config(),
        TEST_BSC_CHAIN_ID,
        test_account_key(),
        test_bls_key(own_seed),
        metrics.clone(),
    ));
    let bsc = Arc::new(BscClient::new(
        bsc_mock.clone(),
        RetryPolicy::new(relay_config.retry_attempts, relay_config.retry_delay()),
        metrics.clone(),
    ));

    let assembler = BscAssembler::new(
        relay_config,
        store.clone(),
        bsc,
        greenfield,
        TEST_BSC_CHAIN_ID,
        metrics.clone(),
        clock.clone(),
    );

    AssemblerHarness {
        assembler,
        store,
        bsc: bsc_mock,
        greenfield: greenfield_mock,
        clock,
        metrics,
        own_bls_key,
    }
}

/// Hex form of a key's BLS pubkey, as the in-turn descriptor carries it.
pub fn hex_pubkey(key: &RelayerBlsKey) -> String {
    hex::encode(key.public_bytes())
}
