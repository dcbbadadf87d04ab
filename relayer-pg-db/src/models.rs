// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use gnfd_relayer_schema::{bsc_relay_package, package_vote};
use gnfd_relayer_types::{PackageVote, RelayPackage};

/// Row of `bsc_relay_package`. Written by the block indexer and the vote
/// processor, read and transitioned by the assembler.
#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = bsc_relay_package)]
pub struct StoredRelayPackage {
    pub id: i64,
    pub channel_id: i16,
    pub oracle_sequence: i64,
    pub package_sequence: i64,
    pub height: i64,
    pub tx_time: i64,
    pub status: String,
    pub claim_payload: Vec<u8>,
    pub claimed_tx_hash: Option<String>,
    pub updated_time: i64,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = bsc_relay_package)]
pub struct NewRelayPackage {
    pub channel_id: i16,
    pub oracle_sequence: i64,
    pub package_sequence: i64,
    pub height: i64,
    pub tx_time: i64,
    pub status: String,
    pub claim_payload: Vec<u8>,
    pub claimed_tx_hash: Option<String>,
    pub updated_time: i64,
}

impl StoredRelayPackage {
    pub fn into_domain(self) -> Result<RelayPackage, String> {
        Ok(RelayPackage {
            id: self.id,
            channel_id: self.channel_id as u8,
            oracle_sequence: self.oracle_sequence as u64,
            package_sequence: self.package_sequence as u64,
            height: self.height as u64,
            tx_time: self.tx_time,
            status: self.status.parse()?,
            claim_payload: self.claim_payload,
            claimed_tx_hash: self.claimed_tx_hash,
        })
    }
}

impl NewRelayPackage {
    pub fn from_domain(pkg: &RelayPackage, now: i64) -> Self {
        Self {
            channel_id: pkg.channel_id as i16,
            oracle_sequence: pkg.oracle_sequence as i64,
            package_sequence: pkg.package_sequence as i64,
            height: pkg.height as i64,
            tx_time: pkg.tx_time,
            status: pkg.status.as_str().to_string(),
            claim_payload: pkg.claim_payload.clone(),
            claimed_tx_hash: pkg.claimed_tx_hash.clone(),
            updated_time: now,
        }
    }
}

/// Row of `package_vote`. Votes land here only after out-of-band signature
/// validation; the assembler treats them as aggregation-ready.
#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = package_vote)]
pub struct StoredVote {
    pub id: i64,
    pub channel_id: i16,
    pub oracle_sequence: i64,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
    pub claim_payload: Vec<u8>,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = package_vote)]
pub struct NewVote {
    pub channel_id: i16,
    pub oracle_sequence: i64,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
    pub claim_payload: Vec<u8>,
}

impl From<StoredVote> for PackageVote {
    fn from(row: StoredVote) -> Self {
        PackageVote {
            channel_id: row.channel_id as u8,
            oracle_sequence: row.oracle_sequence as u64,
            pubkey: row.pubkey,
            signature: row.signature,
            claim_payload: row.claim_payload,
        }
    }
}

impl From<&PackageVote> for NewVote {
    fn from(vote: &PackageVote) -> Self {
        NewVote {
            channel_id: vote.channel_id as i16,
            oracle_sequence: vote.oracle_sequence as i64,
            pubkey: vote.pubkey.clone(),
            signature: vote.signature.clone(),
            claim_payload: vote.claim_payload.clone(),
        }
    }
}
