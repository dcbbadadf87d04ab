// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{RelayerError, RelayerResult};
use crate::metrics::RelayerMetrics;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use ethers::prelude::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address as EthAddress;
use gnfd_relayer_types::ChannelId;
use std::sync::Arc;

abigen!(
    CrossChain,
    r#"[
        function oracleSequence() external view returns (int64)
        function channelSendSequenceMap(uint8 channelId) external view returns (uint64)
        function channelReceiveSequenceMap(uint8 channelId) external view returns (uint64)
    ]"#,
);

// Use a trait to abstract over the contract-backed client and the mock client
// for testing.
#[async_trait]
pub trait BscClientInner: Send + Sync {
    /// Next oracle sequence the destination chain will accept, as tracked by
    /// the source-side cross-chain contract.
    async fn next_deliverable_oracle_sequence(&self, chain_id: u32) -> RelayerResult<u64>;

    /// Next sequence the source chain will emit on the channel.
    async fn channel_send_sequence(&self, channel_id: ChannelId) -> RelayerResult<u64>;
}

pub struct BscClient<P> {
    inner: P,
    retry_policy: RetryPolicy,
    metrics: Arc<RelayerMetrics>,
}

pub type BscExecutor = BscClient<BscContractClient>;

impl<P> BscClient<P>
where
    P: BscClientInner,
{
    pub fn new(inner: P, retry_policy: RetryPolicy, metrics: Arc<RelayerMetrics>) -> Self {
        Self {
            inner,
            retry_policy,
            metrics,
        }
    }

    /// Next deliverable oracle sequence, retried under the configured policy.
    pub async fn next_delivery_oracle_sequence(&self, chain_id: u32) -> RelayerResult<u64> {
        let result = self
            .retry_policy
            .run("query next delivery oracle sequence", || {
                self.inner.next_deliverable_oracle_sequence(chain_id)
            })
            .await;
        if result.is_err() {
            self.metrics.record_rpc_error("next_delivery_oracle_sequence");
        }
        result
    }

    /// Next send sequence for the channel, retried under the configured policy.
    pub async fn next_send_sequence(&self, channel_id: ChannelId) -> RelayerResult<u64> {
        let result = self
            .retry_policy
            .run("query next send sequence", || {
                self.inner.channel_send_sequence(channel_id)
            })
            .await;
        if result.is_err() {
            self.metrics.record_rpc_error("next_send_sequence");
        }
        result
    }
}

/// Production source-side client reading the cross-chain contract's sequence
/// registers over `eth_call`.
pub struct BscContractClient {
    contract: CrossChain<Provider<Http>>,
}

impl BscContractClient {
    /// Connects and validates the node's chain id against the configured one.
    pub async fn connect(
        rpc_url: &str,
        contract_address: &str,
        expected_chain_id: u32,
    ) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        let chain_id = provider.get_chainid().await?.as_u64();
        if chain_id != expected_chain_id as u64 {
            return Err(anyhow::anyhow!(
                "BSC node reports chain id {chain_id}, expected {expected_chain_id}"
            ));
        }
        let address: EthAddress = contract_address.parse()?;
        Ok(Self {
            contract: CrossChain::new(address, Arc::new(provider)),
        })
    }
}

#[async_trait]
impl BscClientInner for BscContractClient {
    async fn next_deliverable_oracle_sequence(&self, _chain_id: u32) -> RelayerResult<u64> {
        // The register holds the latest delivered sequence (-1 before any
        // delivery); the next deliverable one is always one past it.
        let latest: i64 = self
            .contract
            .oracle_sequence()
            .call()
            .await
            .map_err(|e| RelayerError::TransientRpc(format!("oracleSequence: {e}")))?;
        Ok((latest + 1) as u64)
    }

    async fn channel_send_sequence(&self, channel_id: ChannelId) -> RelayerResult<u64> {
        self.contract
            .channel_send_sequence_map(channel_id)
            .call()
            .await
            .map_err(|e| RelayerError::TransientRpc(format!("channelSendSequenceMap: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockBscClient;
    use std::time::Duration;

    fn client_with(mock: MockBscClient) -> BscClient<MockBscClient> {
        BscClient::new(
            mock,
            RetryPolicy::new(3, Duration::from_millis(10)),
            Arc::new(RelayerMetrics::new_for_testing()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_query_retries_through_transient_failures() {
        let mock = MockBscClient::default();
        mock.set_next_delivery_sequence(7);
        mock.fail_next_delivery_queries(2);
        let client = client_with(mock.clone());

        let seq = client.next_delivery_oracle_sequence(5600).await.unwrap();
        assert_eq!(seq, 7);
        assert_eq!(mock.delivery_query_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_error() {
        let mock = MockBscClient::default();
        mock.set_next_delivery_sequence(7);
        mock.fail_next_delivery_queries(10);
        let client = client_with(mock.clone());

        let err = client.next_delivery_oracle_sequence(5600).await.unwrap_err();
        assert!(matches!(err, RelayerError::TransientRpc(_)));
        assert_eq!(mock.delivery_query_count(), 3);
    }

    #[tokio::test]
    async fn send_sequence_reads_channel_register() {
        let mock = MockBscClient::default();
        mock.set_send_sequence(12);
        let client = client_with(mock);

        let seq = client.next_send_sequence(0).await.unwrap();
        assert_eq!(seq, 12);
    }
}
