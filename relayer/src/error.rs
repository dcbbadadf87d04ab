// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayerError {
    // RPC failed in a way that is expected to clear on retry
    TransientRpc(String),
    // RPC failed after retries were exhausted
    Rpc(String),
    // Claim transaction was rejected by the destination node
    ClaimBroadcast { code: u32, raw_log: String },
    // Packages for the sequence are not yet AllVoted/Delivered
    InsufficientVotes(u64),
    // The relay interval starts in the future relative to local time
    ClockSkew { now: i64, interval_start: u64 },
    // Sequence store failure
    Storage(String),
    // No vote signature matched the current validator snapshot
    EmptySignatureAggregation,
    // Malformed key material or signature bytes
    InvalidKey(String),
    // Uncategorized error
    Generic(String),
}

impl RelayerError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayerError::TransientRpc(_) => "transient_rpc",
            RelayerError::Rpc(_) => "rpc",
            RelayerError::ClaimBroadcast { .. } => "claim_broadcast",
            RelayerError::InsufficientVotes(_) => "insufficient_votes",
            RelayerError::ClockSkew { .. } => "clock_skew",
            RelayerError::Storage(_) => "storage",
            RelayerError::EmptySignatureAggregation => "empty_signature_aggregation",
            RelayerError::InvalidKey(_) => "invalid_key",
            RelayerError::Generic(_) => "generic",
        }
    }
}

impl fmt::Display for RelayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayerError::TransientRpc(msg) => write!(f, "transient rpc error: {msg}"),
            RelayerError::Rpc(msg) => write!(f, "rpc error: {msg}"),
            RelayerError::ClaimBroadcast { code, raw_log } => {
                write!(f, "claim error, code={code}, log={raw_log}")
            }
            RelayerError::InsufficientVotes(seq) => write!(
                f,
                "packages with oracle sequence {seq} do not have enough votes yet"
            ),
            RelayerError::ClockSkew { now, interval_start } => write!(
                f,
                "blockchain time and relayer time are not consistent, now {now} should be after {interval_start}"
            ),
            RelayerError::Storage(msg) => write!(f, "storage error: {msg}"),
            RelayerError::EmptySignatureAggregation => {
                write!(f, "no vote signature matched the validator snapshot")
            }
            RelayerError::InvalidKey(msg) => write!(f, "invalid key material: {msg}"),
            RelayerError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RelayerError {}

impl From<anyhow::Error> for RelayerError {
    fn from(e: anyhow::Error) -> Self {
        RelayerError::Storage(format!("{e:#}"))
    }
}

pub type RelayerResult<T> = Result<T, RelayerError>;
