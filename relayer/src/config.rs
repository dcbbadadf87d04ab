// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto::{RelayerAccountKey, RelayerBlsKey};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Relay pipeline tuning. All durations are explicit in the field name.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    // Assembler tick period.
    pub assemble_interval_ms: u64,
    // Grace period before a fresh in-turn cursor is taken; also the stand-by
    // pre-pass sleep.
    pub greenfield_sequence_update_latency_secs: i64,
    // Stand-by relayers leave each package to the in-turn relayer for this long.
    pub bsc_to_greenfield_inturn_relayer_timeout_secs: i64,
    // Age after which a pending package raises the delay gauge.
    pub tx_delay_alert_threshold_secs: i64,
    // Bounded retry for source-side sequence queries.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    // Validator cache refresh period.
    pub update_cached_validators_interval_secs: u64,
}

impl RelayConfig {
    pub fn assemble_interval(&self) -> Duration {
        Duration::from_millis(self.assemble_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn update_cached_validators_interval(&self) -> Duration {
        Duration::from_secs(self.update_cached_validators_interval_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            assemble_interval_ms: 2_000,
            greenfield_sequence_update_latency_secs: 30,
            bsc_to_greenfield_inturn_relayer_timeout_secs: 120,
            tx_delay_alert_threshold_secs: 300,
            retry_attempts: 5,
            retry_delay_ms: 1_000,
            update_cached_validators_interval_secs: 60,
        }
    }
}

/// Where a secret comes from: inline hex, or a named handle served by the
/// deployment's secret store.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecretSource {
    Hex {
        hex: String,
    },
    Named {
        #[serde(rename = "secret-name")]
        secret_name: String,
    },
}

/// Resolves named secret handles at boot. The relayer itself never talks to
/// the secret backend; deployments inject whatever store they use.
pub trait SecretStore: Send + Sync {
    fn fetch(&self, name: &str) -> anyhow::Result<String>;
}

/// Secret store backed by process environment variables, the default for
/// containerized deployments.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn fetch(&self, name: &str) -> anyhow::Result<String> {
        std::env::var(name).with_context(|| format!("secret {name} not present in environment"))
    }
}

impl SecretSource {
    pub fn resolve(&self, store: &dyn SecretStore) -> anyhow::Result<String> {
        match self {
            SecretSource::Hex { hex } => Ok(hex.clone()),
            SecretSource::Named { secret_name } => store.fetch(secret_name),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GreenfieldConfig {
    // Rpc url for a Greenfield fullnode, used for queries, the vote pool and
    // claim submission.
    pub rpc_url: String,
    // The expected chain id on the Greenfield side.
    pub chain_id: u32,
    // Human-readable chain id string carried in signed transactions.
    pub chain_id_string: String,
    pub gas_limit: u64,
    pub fee_amount: u64,
    pub fee_denom: String,
    // Account key used to sign claim transactions.
    pub account_key: SecretSource,
    // BLS key identifying this relayer in the federated set.
    pub bls_key: SecretSource,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BscConfig {
    // Rpc url for a BSC fullnode.
    pub rpc_url: String,
    // The expected chain id on the BSC side.
    pub chain_id: u32,
    // Address of the cross-chain contract holding the sequence registers.
    pub cross_chain_contract_address: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DbConfig {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayerNodeConfig {
    pub metrics_port: u16,
    #[serde(default)]
    pub relay: RelayConfig,
    pub greenfield: GreenfieldConfig,
    pub bsc: BscConfig,
    pub db: DbConfig,
}

impl RelayerNodeConfig {
    /// Load from YAML or JSON depending on the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(config)
    }

    /// Resolve secret handles and parse key material. An unreachable secret
    /// store surfaces as an error; malformed key material panics (startup
    /// configuration fault, nothing is recoverable at runtime).
    pub fn resolve_keys(&self, store: &dyn SecretStore) -> anyhow::Result<RelayerKeys> {
        let account_hex = self
            .greenfield
            .account_key
            .resolve(store)
            .context("failed to resolve account key")?;
        let bls_hex = self
            .greenfield
            .bls_key
            .resolve(store)
            .context("failed to resolve bls key")?;

        Ok(RelayerKeys {
            account: RelayerAccountKey::from_hex(&account_hex),
            bls: RelayerBlsKey::from_hex(&bls_hex),
        })
    }
}

/// The two independent secrets a relayer process holds.
pub struct RelayerKeys {
    pub account: RelayerAccountKey,
    pub bls: RelayerBlsKey,
}
