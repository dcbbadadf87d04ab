// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! BLS vote aggregation for claim submission.
//!
//! A claim carries one aggregated signature plus a membership bitset over the
//! destination validator set. Bit `k` refers to position `k` of the validator
//! snapshot the aggregate was built against, so the snapshot order must be the
//! chain's order.

use crate::crypto::verify_bls_signature;
use crate::error::{RelayerError, RelayerResult};
use fastcrypto::bls12381::min_pk::{BLS12381AggregateSignature, BLS12381Signature};
use fastcrypto::traits::{AggregateAuthenticator, ToFromBytes};
use gnfd_relayer_types::{PackageVote, ValidatorInfo};

/// Aggregate all vote signatures whose signer appears in the validator
/// snapshot and pack the contributing indices into a little-endian bitset.
///
/// Votes from signers outside the snapshot are skipped: a validator-set
/// rotation between vote collection and claim assembly must not poison the
/// claim. Fails when nothing can be aggregated.
pub fn aggregate_signature_and_bitset(
    votes: &[PackageVote],
    validators: &[ValidatorInfo],
) -> RelayerResult<(Vec<u8>, Vec<u8>)> {
    let mut signatures = Vec::with_capacity(votes.len());
    let mut member_indices = Vec::with_capacity(votes.len());

    for vote in votes {
        let Some(index) = validators
            .iter()
            .position(|v| v.bls_pubkey == vote.pubkey)
        else {
            continue;
        };
        let signature = BLS12381Signature::from_bytes(&vote.signature)
            .map_err(|e| RelayerError::InvalidKey(format!("vote signature rejected: {e}")))?;
        signatures.push(signature);
        member_indices.push(index);
    }

    if signatures.is_empty() {
        return Err(RelayerError::EmptySignatureAggregation);
    }

    let aggregate = BLS12381AggregateSignature::aggregate(&signatures)
        .map_err(|e| RelayerError::InvalidKey(format!("signature aggregation failed: {e}")))?;

    Ok((
        aggregate.as_bytes().to_vec(),
        bitset_bytes(&member_indices, validators.len()),
    ))
}

/// Little-endian bit packing: bit `k` lands in byte `k / 8` at position `k % 8`.
fn bitset_bytes(indices: &[usize], validator_count: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; validator_count.div_ceil(8)];
    for &index in indices {
        bytes[index / 8] |= 1 << (index % 8);
    }
    bytes
}

/// Verify one vote share against its claim payload. Used on the vote
/// admission path; the assembler itself only sees pre-validated votes.
pub fn verify_vote(vote: &PackageVote) -> RelayerResult<()> {
    verify_bls_signature(&vote.pubkey, &vote.signature, &vote.claim_payload)
}
