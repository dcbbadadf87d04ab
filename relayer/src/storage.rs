// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The assembler's view of the package and vote store.
//!
//! A trait seam so the pipeline is testable without Postgres; the production
//! implementation lives in `gnfd-relayer-pg-db`.

use crate::error::{RelayerError, RelayerResult};
use async_trait::async_trait;
use gnfd_relayer_pg_db::store::PgSequenceStore;
use gnfd_relayer_types::{ChannelId, PackageStatus, PackageVote, RelayPackage};

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// All packages batched under one oracle sequence, in batch order.
    async fn packages_by_oracle_sequence(&self, sequence: u64) -> RelayerResult<Vec<RelayPackage>>;

    /// Maximum oracle sequence carrying the given status, `-1` when none.
    async fn latest_oracle_sequence_by_status(&self, status: PackageStatus) -> RelayerResult<i64>;

    /// Aggregation-ready votes for one oracle sequence.
    async fn votes_by_channel_and_sequence(
        &self,
        channel_id: ChannelId,
        sequence: u64,
    ) -> RelayerResult<Vec<PackageVote>>;

    /// Transactional batch transition, recording the claimed tx hash.
    async fn update_batch_status_and_claimed_tx_hash(
        &self,
        ids: &[i64],
        status: PackageStatus,
        tx_hash: &str,
    ) -> RelayerResult<()>;

    /// Transactionally record the claimed tx hash without touching status.
    async fn update_batch_claimed_tx_hash(&self, ids: &[i64], tx_hash: &str) -> RelayerResult<()>;
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn packages_by_oracle_sequence(&self, sequence: u64) -> RelayerResult<Vec<RelayPackage>> {
        PgSequenceStore::packages_by_oracle_sequence(self, sequence)
            .await
            .map_err(RelayerError::from)
    }

    async fn latest_oracle_sequence_by_status(&self, status: PackageStatus) -> RelayerResult<i64> {
        PgSequenceStore::latest_oracle_sequence_by_status(self, status)
            .await
            .map_err(RelayerError::from)
    }

    async fn votes_by_channel_and_sequence(
        &self,
        channel_id: ChannelId,
        sequence: u64,
    ) -> RelayerResult<Vec<PackageVote>> {
        PgSequenceStore::votes_by_channel_and_sequence(self, channel_id, sequence)
            .await
            .map_err(RelayerError::from)
    }

    async fn update_batch_status_and_claimed_tx_hash(
        &self,
        ids: &[i64],
        status: PackageStatus,
        tx_hash: &str,
    ) -> RelayerResult<()> {
        PgSequenceStore::update_batch_status_and_claimed_tx_hash(self, ids, status, tx_hash)
            .await
            .map_err(RelayerError::from)
    }

    async fn update_batch_claimed_tx_hash(&self, ids: &[i64], tx_hash: &str) -> RelayerResult<()> {
        PgSequenceStore::update_batch_claimed_tx_hash(self, ids, tx_hash)
            .await
            .map_err(RelayerError::from)
    }
}
