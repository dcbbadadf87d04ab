// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Postgres-backed package and vote store.
//!
//! The package table is the single source of truth for delivery status; every
//! status transition runs in one transaction so partial batch updates are
//! impossible. Reads are non-locking.

use anyhow::{Context, Result};
use diesel::dsl::{max, min};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use gnfd_relayer_schema::{bsc_relay_package, package_vote};
use gnfd_relayer_types::{ChannelId, PackageStatus, PackageVote, RelayPackage};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{NewRelayPackage, NewVote, StoredRelayPackage, StoredVote};
use crate::Db;

#[derive(Clone)]
pub struct PgSequenceStore {
    db: Db,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl PgSequenceStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// All packages batched under one oracle sequence, in batch order.
    pub async fn packages_by_oracle_sequence(&self, sequence: u64) -> Result<Vec<RelayPackage>> {
        use bsc_relay_package::dsl;

        let mut conn = self.db.connect().await?;
        let rows: Vec<StoredRelayPackage> = dsl::bsc_relay_package
            .filter(dsl::oracle_sequence.eq(sequence as i64))
            .order(dsl::package_sequence.asc())
            .load(&mut conn)
            .await
            .context("Failed to load packages by oracle sequence")?;

        rows.into_iter()
            .map(|row| row.into_domain().map_err(anyhow::Error::msg))
            .collect()
    }

    /// Maximum oracle sequence currently carrying the given status, or `-1`
    /// when no row does.
    pub async fn latest_oracle_sequence_by_status(&self, status: PackageStatus) -> Result<i64> {
        use bsc_relay_package::dsl;

        let mut conn = self.db.connect().await?;
        let result: Option<i64> = dsl::bsc_relay_package
            .filter(dsl::status.eq(status.as_str()))
            .select(max(dsl::oracle_sequence))
            .first(&mut conn)
            .await
            .context("Failed to query latest oracle sequence by status")?;

        Ok(result.unwrap_or(-1))
    }

    /// Aggregation-ready votes for one oracle sequence.
    pub async fn votes_by_channel_and_sequence(
        &self,
        channel_id: ChannelId,
        sequence: u64,
    ) -> Result<Vec<PackageVote>> {
        use package_vote::dsl;

        let mut conn = self.db.connect().await?;
        let rows: Vec<StoredVote> = dsl::package_vote
            .filter(dsl::channel_id.eq(channel_id as i16))
            .filter(dsl::oracle_sequence.eq(sequence as i64))
            .load(&mut conn)
            .await
            .context("Failed to load votes")?;

        Ok(rows.into_iter().map(PackageVote::from).collect())
    }

    /// Transactionally move a claimed batch to the given status and record the
    /// destination tx hash. Repeating the call with the same arguments is a
    /// no-op.
    pub async fn update_batch_status_and_claimed_tx_hash(
        &self,
        ids: &[i64],
        status: PackageStatus,
        tx_hash: &str,
    ) -> Result<()> {
        use bsc_relay_package::dsl;

        let mut conn = self.db.connect().await?;
        let ids = ids.to_vec();
        let tx_hash = tx_hash.to_string();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::update(dsl::bsc_relay_package.filter(dsl::id.eq_any(ids)))
                    .set((
                        dsl::status.eq(status.as_str()),
                        dsl::claimed_tx_hash.eq(tx_hash),
                        dsl::updated_time.eq(unix_now()),
                    ))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .context("Failed to update batch status and claimed tx hash")
    }

    /// Transactionally record the claimed tx hash without touching status.
    /// Used by stand-by relayers, which never own the status transition.
    pub async fn update_batch_claimed_tx_hash(&self, ids: &[i64], tx_hash: &str) -> Result<()> {
        use bsc_relay_package::dsl;

        let mut conn = self.db.connect().await?;
        let ids = ids.to_vec();
        let tx_hash = tx_hash.to_string();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::update(dsl::bsc_relay_package.filter(dsl::id.eq_any(ids)))
                    .set((
                        dsl::claimed_tx_hash.eq(tx_hash),
                        dsl::updated_time.eq(unix_now()),
                    ))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .context("Failed to update batch claimed tx hash")
    }

    /// Indexer write side: persist a batch of freshly observed packages in one
    /// transaction. Conflicting rows (already indexed) are skipped.
    pub async fn save_packages(&self, packages: &[RelayPackage]) -> Result<()> {
        use bsc_relay_package::dsl;

        if packages.is_empty() {
            return Ok(());
        }

        let now = unix_now();
        let rows: Vec<NewRelayPackage> = packages
            .iter()
            .map(|pkg| NewRelayPackage::from_domain(pkg, now))
            .collect();

        let mut conn = self.db.connect().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::insert_into(dsl::bsc_relay_package)
                    .values(&rows)
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .context("Failed to save packages")
    }

    /// Persist one validated vote. A duplicate
    /// `(channel_id, oracle_sequence, pubkey)` insert is a no-op.
    pub async fn save_vote(&self, vote: &PackageVote) -> Result<()> {
        use package_vote::dsl;

        let row = NewVote::from(vote);
        let mut conn = self.db.connect().await?;
        diesel::insert_into(dsl::package_vote)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await
            .context("Failed to save vote")?;
        Ok(())
    }

    /// Oldest un-relayed package time, for delivery-lag monitoring.
    pub async fn earliest_saved_tx_time(&self) -> Result<Option<i64>> {
        use bsc_relay_package::dsl;

        let mut conn = self.db.connect().await?;
        let result: Option<i64> = dsl::bsc_relay_package
            .filter(dsl::status.eq(PackageStatus::Saved.as_str()))
            .select(min(dsl::tx_time))
            .first(&mut conn)
            .await
            .context("Failed to query earliest saved tx time")?;
        Ok(result)
    }
}
