// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared domain types for the BSC → Greenfield relayer.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt;
use std::str::FromStr;

/// Cross-chain channel identifier (8-bit on the wire).
pub type ChannelId = u8;

/// The oracle channel carries aggregated cross-chain package batches.
pub const ORACLE_CHANNEL_ID: ChannelId = 0x00;

/// Size of a BLS12-381 min-pk public key.
pub const BLS_PUBKEY_LENGTH: usize = 48;
/// Size of a BLS12-381 min-pk (aggregated) signature.
pub const BLS_SIGNATURE_LENGTH: usize = 96;

/// Vote-pool event type for packages flowing from BSC to Greenfield.
pub const FROM_BSC_CROSS_CHAIN_EVENT: u32 = 1;

/// Lifecycle of a relayed package batch. Transitions are strictly forward:
/// `Saved -> AllVoted -> Delivered`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageStatus {
    /// Observed and persisted by the block indexer.
    Saved,
    /// Enough validated votes collected to aggregate a claim signature.
    AllVoted,
    /// Claim transaction accepted on Greenfield.
    Delivered,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Saved => "saved",
            PackageStatus::AllVoted => "all_voted",
            PackageStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saved" => Ok(PackageStatus::Saved),
            "all_voted" => Ok(PackageStatus::AllVoted),
            "delivered" => Ok(PackageStatus::Delivered),
            other => Err(format!("unknown package status: {other}")),
        }
    }
}

/// One cross-chain package observed on BSC, keyed by
/// `(channel_id, oracle_sequence, package_sequence)`. Several packages may
/// share an oracle sequence; they are delivered under a single claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPackage {
    pub id: i64,
    pub channel_id: ChannelId,
    pub oracle_sequence: u64,
    /// Ordinal of this package inside the oracle batch.
    pub package_sequence: u64,
    /// BSC block height of the emitting transaction.
    pub height: u64,
    /// Wall-clock seconds of the emitting block.
    pub tx_time: i64,
    pub status: PackageStatus,
    /// Opaque bytes the validators voted on.
    pub claim_payload: Vec<u8>,
    pub claimed_tx_hash: Option<String>,
}

/// A pre-validated BLS vote over one oracle sequence's claim payload.
/// At most one vote per `(channel_id, oracle_sequence, pubkey)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVote {
    pub channel_id: ChannelId,
    pub oracle_sequence: u64,
    /// 48-byte BLS public key of the voting validator.
    pub pubkey: Vec<u8>,
    /// 96-byte BLS signature over `claim_payload`.
    pub signature: Vec<u8>,
    pub claim_payload: Vec<u8>,
}

/// One entry of the destination validator set snapshot. The snapshot order is
/// significant: the claim's membership bitset indexes validators by position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub bls_pubkey: Vec<u8>,
    pub voting_power: u64,
    pub relayer_address: String,
}

/// Half-open time window `[start, end)` in unix seconds during which one
/// relayer is designated in-turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayInterval {
    pub start: u64,
    pub end: u64,
}

/// The destination chain's current in-turn relayer designation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InturnRelayer {
    /// Hex-encoded BLS public key of the designated relayer.
    pub bls_pub_key: String,
    pub relay_interval: RelayInterval,
}

/// The assembler's in-memory delivery cursor. Role flips collapse the whole
/// value; fields never survive a role change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayerCursor {
    #[default]
    Uninitialized,
    InTurn {
        next_delivery_seq: u64,
        nonce: u64,
    },
    StandBy {
        nonce: u64,
    },
}

impl RelayerCursor {
    /// Whether the in-turn start sequence and nonce have been taken from the
    /// chain for the current in-turn interval.
    pub fn is_in_turn(&self) -> bool {
        matches!(self, RelayerCursor::InTurn { .. })
    }

    pub fn nonce(&self) -> Option<u64> {
        match self {
            RelayerCursor::Uninitialized => None,
            RelayerCursor::InTurn { nonce, .. } | RelayerCursor::StandBy { nonce } => Some(*nonce),
        }
    }
}

/// Result of broadcasting a transaction to the destination chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBroadcastResponse {
    pub code: u32,
    pub tx_hash: String,
    #[serde(default)]
    pub raw_log: String,
}

impl TxBroadcastResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// A vote as carried by the destination node's vote-pool JSON-RPC surface.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolVote {
    #[serde_as(as = "Base64")]
    pub pub_key: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
    pub event_type: u32,
    #[serde_as(as = "Base64")]
    pub event_hash: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}
