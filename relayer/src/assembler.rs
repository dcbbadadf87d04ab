// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The assembler: a ticker-driven loop that selects the next contiguous
//! oracle sequences, aggregates vote signatures and submits claim
//! transactions on Greenfield.
//!
//! Exactly one relayer is designated in-turn per interval; everyone else runs
//! the stand-by path, delayed behind the in-turn relayer's window. The
//! in-memory cursor and the delay-alert set are owned by this task alone.

use crate::bsc_executor::{BscClient, BscClientInner};
use crate::config::RelayConfig;
use crate::error::{RelayerError, RelayerResult};
use crate::greenfield_executor::{GreenfieldClient, GreenfieldClientInner};
use crate::metrics::RelayerMetrics;
use crate::storage::SequenceStore;
use crate::vote::aggregate_signature_and_bitset;
use gnfd_relayer_types::{ChannelId, PackageStatus, RelayPackage, RelayerCursor, ORACLE_CHANNEL_ID};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Wall-clock source, injected so timing scenarios are testable without
/// sleeping through real intervals.
pub trait Clock: Send + Sync {
    fn unix_now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

pub struct BscAssembler<S, B, G> {
    relay_config: RelayConfig,
    store: Arc<S>,
    bsc: Arc<BscClient<B>>,
    greenfield: Arc<GreenfieldClient<G>>,
    // Source chain id, echoed into delivery-sequence queries.
    chain_id: u32,
    // This process's BLS identity, compared against the in-turn descriptor.
    bls_pubkey: Vec<u8>,
    cursor: RelayerCursor,
    // Sequences currently flagged as delayed. Cleared wholesale once the
    // start sequence passes the newest flagged entry.
    alert_set: HashSet<u64>,
    metrics: Arc<RelayerMetrics>,
    clock: Arc<dyn Clock>,
}

impl<S, B, G> BscAssembler<S, B, G>
where
    S: SequenceStore,
    B: BscClientInner,
    G: GreenfieldClientInner,
{
    pub fn new(
        relay_config: RelayConfig,
        store: Arc<S>,
        bsc: Arc<BscClient<B>>,
        greenfield: Arc<GreenfieldClient<G>>,
        chain_id: u32,
        metrics: Arc<RelayerMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bls_pubkey = greenfield.bls_pubkey();
        Self {
            relay_config,
            store,
            bsc,
            greenfield,
            chain_id,
            bls_pubkey,
            cursor: RelayerCursor::Uninitialized,
            alert_set: HashSet::new(),
            metrics,
            clock,
        }
    }

    pub fn cursor(&self) -> RelayerCursor {
        self.cursor
    }

    /// Assemble packages and claim them on Greenfield until cancelled.
    /// Cancellation lands between passes; an in-flight pass always completes.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.relay_config.assemble_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("assembler loop shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.process(ORACLE_CHANNEL_ID).await {
                        error!("encountered error when relaying packages, err={e}");
                    }
                }
            }
        }
    }

    /// One pass of the pipeline.
    pub async fn process(&mut self, channel_id: ChannelId) -> RelayerResult<()> {
        let inturn = self.greenfield.get_inturn_relayer().await?;
        let inturn_pubkey = hex::decode(inturn.bls_pub_key.trim_start_matches("0x"))
            .map_err(|e| RelayerError::Generic(format!("in-turn relayer pubkey is not hex: {e}")))?;
        let is_inturn = self.bls_pubkey == inturn_pubkey;
        self.metrics.set_inturn(is_inturn, inturn.relay_interval);

        let start_seq = if is_inturn {
            if !self.cursor.is_in_turn() {
                // A fresh in-turn interval: take the start sequence from the
                // chain once it has had time to reflect the handover.
                let now = self.clock.unix_now();
                let time_diff = now - inturn.relay_interval.start as i64;
                if time_diff < self.relay_config.greenfield_sequence_update_latency_secs {
                    if time_diff < 0 {
                        return Err(RelayerError::ClockSkew {
                            now,
                            interval_start: inturn.relay_interval.start,
                        });
                    }
                    return Ok(());
                }
                let next_delivery_seq = self
                    .bsc
                    .next_delivery_oracle_sequence(self.chain_id)
                    .await?;
                let nonce = self.greenfield.get_nonce().await?;
                self.cursor = RelayerCursor::InTurn {
                    next_delivery_seq,
                    nonce,
                };
            }
            match self.cursor {
                RelayerCursor::InTurn {
                    next_delivery_seq, ..
                } => next_delivery_seq,
                // just set above
                _ => unreachable!("in-turn cursor must be initialized at this point"),
            }
        } else {
            self.cursor = RelayerCursor::Uninitialized;
            // Let the in-turn relayer win every race before reading a stand-by
            // cursor from the chain.
            tokio::time::sleep(Duration::from_secs(
                self.relay_config.greenfield_sequence_update_latency_secs.max(0) as u64,
            ))
            .await;
            let start_seq = self
                .bsc
                .next_delivery_oracle_sequence(self.chain_id)
                .await?;
            let nonce = self.greenfield.get_nonce().await?;
            self.cursor = RelayerCursor::StandBy { nonce };
            start_seq
        };

        self.update_channel_metrics(channel_id, start_seq).await?;

        let end_sequence: i64 = if is_inturn {
            let latest = self
                .store
                .latest_oracle_sequence_by_status(PackageStatus::AllVoted)
                .await?;
            if latest == -1 {
                return Ok(());
            }
            latest
        } else {
            let next_send = self.bsc.next_send_sequence(channel_id).await?;
            next_send as i64 - 1
        };
        debug!("start and end sequences are {start_seq} and {end_sequence}");

        if let Some(max_alerted) = self.alert_set.iter().max().copied() {
            if start_seq > max_alerted {
                self.metrics.set_has_tx_delay(false);
                self.alert_set.clear();
            }
        }

        let mut sequence = start_seq;
        while (sequence as i64) <= end_sequence {
            let pkgs = self.store.packages_by_oracle_sequence(sequence).await?;
            if pkgs.is_empty() {
                // The indexer has not caught up; a gap is a defer signal,
                // never something to bridge.
                return Ok(());
            }
            let pkg_time = pkgs[0].tx_time;
            let status = pkgs[0].status;
            let now = self.clock.unix_now();

            if now - pkg_time > self.relay_config.tx_delay_alert_threshold_secs {
                self.metrics.set_has_tx_delay(true);
                self.alert_set.insert(sequence);
            }

            if status != PackageStatus::AllVoted && status != PackageStatus::Delivered {
                return Err(RelayerError::InsufficientVotes(sequence));
            }

            // A stand-by relayer must not step on the in-turn relayer's window.
            if !is_inturn
                && now < pkg_time + self.relay_config.bsc_to_greenfield_inturn_relayer_timeout_secs
            {
                return Ok(());
            }

            let nonce = self
                .cursor
                .nonce()
                .ok_or_else(|| RelayerError::Generic("relayer cursor is not initialized".into()))?;

            if let Err(e) = self
                .process_batch(&pkgs, channel_id, sequence, nonce, is_inturn)
                .await
            {
                if !is_inturn {
                    return Err(e);
                }
                // A peer node may have consumed the same nonce or sequence
                // under a different mempool view. Re-anchor against the chain
                // instead of re-broadcasting the same pair and burning gas.
                self.calibrate().await?;
                return Err(e);
            }
            info!("relayed packages with oracle sequence {sequence}");
            self.advance_cursor(sequence, is_inturn);
            sequence += 1;
        }
        Ok(())
    }

    /// Aggregate votes for one oracle sequence and submit its claim.
    async fn process_batch(
        &self,
        pkgs: &[RelayPackage],
        channel_id: ChannelId,
        sequence: u64,
        nonce: u64,
        is_inturn: bool,
    ) -> RelayerResult<()> {
        let votes = self
            .store
            .votes_by_channel_and_sequence(channel_id, sequence)
            .await
            .map_err(|e| {
                error!("failed to get votes for channel {channel_id} and sequence {sequence}");
                e
            })?;
        let validators = self.greenfield.cached_validators().await?;

        let (aggregated_signature, vote_addr_set) =
            aggregate_signature_and_bitset(&votes, &validators).map_err(|e| {
                self.metrics.err_signature_aggregation.inc();
                e
            })?;

        let tx_hash = self
            .greenfield
            .claim_packages(
                &votes[0].claim_payload,
                aggregated_signature,
                vote_addr_set,
                pkgs[0].tx_time,
                sequence,
                nonce,
            )
            .await?;
        info!("claimed transaction with oracle_sequence={sequence}, tx_hash={tx_hash}");

        let pkg_ids: Vec<i64> = pkgs.iter().map(|p| p.id).collect();
        self.metrics.set_processed_block_height(pkgs[0].height);

        if !is_inturn {
            // Stand-by relayers record the hash but never own the status
            // transition.
            return self
                .store
                .update_batch_claimed_tx_hash(&pkg_ids, &tx_hash)
                .await;
        }

        self.store
            .update_batch_status_and_claimed_tx_hash(&pkg_ids, PackageStatus::Delivered, &tx_hash)
            .await
            .map_err(|e| {
                error!("failed to update packages to 'delivered', error={e}");
                e
            })
    }

    /// Collision recovery: wait out one destination block, then overwrite the
    /// cursor with the chain's view of nonce and delivery sequence.
    async fn calibrate(&mut self) -> RelayerResult<()> {
        let nonce = self.greenfield.get_nonce_on_next_block().await?;
        let next_delivery_seq = self
            .bsc
            .next_delivery_oracle_sequence(self.chain_id)
            .await?;
        self.cursor = RelayerCursor::InTurn {
            next_delivery_seq,
            nonce,
        };
        Ok(())
    }

    fn advance_cursor(&mut self, delivered_sequence: u64, is_inturn: bool) {
        self.cursor = match self.cursor {
            RelayerCursor::InTurn { nonce, .. } if is_inturn => RelayerCursor::InTurn {
                next_delivery_seq: delivered_sequence + 1,
                nonce: nonce + 1,
            },
            RelayerCursor::StandBy { nonce } => RelayerCursor::StandBy { nonce: nonce + 1 },
            other => other,
        };
    }

    async fn update_channel_metrics(
        &self,
        channel_id: ChannelId,
        next_delivery_seq: u64,
    ) -> RelayerResult<()> {
        self.metrics
            .set_next_receive_sequence(channel_id, next_delivery_seq);
        let next_send = self.bsc.next_send_sequence(channel_id).await?;
        self.metrics.set_next_send_sequence(channel_id, next_send);
        Ok(())
    }
}
