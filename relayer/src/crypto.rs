// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use ethers::core::k256::ecdsa::VerifyingKey;
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use fastcrypto::bls12381::min_pk::{
    BLS12381KeyPair, BLS12381PrivateKey, BLS12381PublicKey, BLS12381Signature,
};
use fastcrypto::hash::{HashFunction, Keccak256};
use fastcrypto::secp256k1::{Secp256k1KeyPair, Secp256k1PrivateKey};
use fastcrypto::traits::{KeyPair, Signer, ToFromBytes, VerifyingKey as _};
use gnfd_relayer_types::{BLS_PUBKEY_LENGTH, BLS_SIGNATURE_LENGTH};

pub type RelayerBlsPublicKey = BLS12381PublicKey;
pub type RelayerBlsSignature = BLS12381Signature;

/// The BLS identity of this relayer within the federated relayer set.
/// Vote signatures are made and aggregated under the min-pk scheme
/// (48-byte public keys, 96-byte signatures).
pub struct RelayerBlsKey {
    keypair: BLS12381KeyPair,
}

impl RelayerBlsKey {
    /// Parse the BLS secret. Key material only ever arrives at startup, so a
    /// malformed secret is a configuration fault and panics.
    pub fn from_hex(s: &str) -> Self {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .unwrap_or_else(|e| panic!("unparseable bls secret, not hex: {e}"));
        let private = BLS12381PrivateKey::from_bytes(&bytes)
            .unwrap_or_else(|e| panic!("unparseable bls secret: {e}"));
        Self {
            keypair: BLS12381KeyPair::from(private),
        }
    }

    pub fn public_key(&self) -> &RelayerBlsPublicKey {
        self.keypair.public()
    }

    /// The 48-byte identity compared against the chain's in-turn descriptor.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.keypair.public().as_bytes().to_vec()
    }

    pub fn sign(&self, msg: &[u8]) -> RelayerBlsSignature {
        self.keypair.sign(msg)
    }
}

/// Verify a single BLS vote share over a claim payload.
pub fn verify_bls_signature(pubkey: &[u8], signature: &[u8], msg: &[u8]) -> RelayerResult<()> {
    if pubkey.len() != BLS_PUBKEY_LENGTH {
        return Err(RelayerError::InvalidKey(format!(
            "bls pubkey must be {BLS_PUBKEY_LENGTH} bytes, got {}",
            pubkey.len()
        )));
    }
    if signature.len() != BLS_SIGNATURE_LENGTH {
        return Err(RelayerError::InvalidKey(format!(
            "bls signature must be {BLS_SIGNATURE_LENGTH} bytes, got {}",
            signature.len()
        )));
    }
    let pubkey = BLS12381PublicKey::from_bytes(pubkey)
        .map_err(|e| RelayerError::InvalidKey(format!("bad bls pubkey: {e}")))?;
    let signature = BLS12381Signature::from_bytes(signature)
        .map_err(|e| RelayerError::InvalidKey(format!("bad bls signature: {e}")))?;
    pubkey
        .verify(msg, &signature)
        .map_err(|e| RelayerError::InvalidKey(format!("bls verification failed: {e}")))
}

/// The secp256k1 account key that signs claim transactions on Greenfield.
/// Greenfield accounts use Ethereum-style addresses.
pub struct RelayerAccountKey {
    keypair: Secp256k1KeyPair,
    address: String,
}

impl RelayerAccountKey {
    /// Parse the account secret. As with the BLS key, malformed material is a
    /// startup configuration fault and panics.
    pub fn from_hex(s: &str) -> Self {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .unwrap_or_else(|e| panic!("unparseable account secret, not hex: {e}"));
        let private = Secp256k1PrivateKey::from_bytes(&bytes)
            .unwrap_or_else(|e| panic!("unparseable account secret: {e}"));
        let keypair = Secp256k1KeyPair::from(private);
        let address = eth_address_of(&keypair);
        Self { keypair, address }
    }

    /// 0x-prefixed account address derived from the public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn keypair(&self) -> &Secp256k1KeyPair {
        &self.keypair
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.keypair.sign(msg).as_bytes().to_vec()
    }
}

fn eth_address_of(keypair: &Secp256k1KeyPair) -> String {
    // unwrap: a freshly derived public key is always a valid sec1 point
    let pubkey = VerifyingKey::from_sec1_bytes(keypair.public().as_bytes()).unwrap();
    let affine: &ethers::core::k256::AffinePoint = pubkey.as_ref();
    let encoded = affine.to_encoded_point(false);
    let raw = &encoded.as_bytes()[1..];
    let hash = Keccak256::digest(raw).digest;
    format!("0x{}", hex::encode(&hash[12..]))
}
