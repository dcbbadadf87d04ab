// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use gnfd_relayer_types::{ChannelId, RelayInterval};
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec, Registry,
};

/// Gauges and counters the relay pipeline writes. All setters are
/// fire-and-forget; nothing in the pipeline depends on a metric read.
#[derive(Clone, Debug)]
pub struct RelayerMetrics {
    pub(crate) inturn_relayer: IntGauge,
    pub(crate) inturn_interval_start: IntGauge,
    pub(crate) inturn_interval_end: IntGauge,
    pub(crate) next_receive_sequence: IntGaugeVec,
    pub(crate) next_send_sequence: IntGaugeVec,
    pub(crate) has_tx_delay: IntGauge,
    pub(crate) processed_block_height: IntGauge,
    pub(crate) claims_submitted: IntCounter,
    pub(crate) err_claim_submission: IntCounter,
    pub(crate) err_signature_aggregation: IntCounter,
    pub(crate) rpc_errors: IntCounterVec,
}

impl RelayerMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            inturn_relayer: register_int_gauge_with_registry!(
                "relayer_inturn",
                "Whether this process is the in-turn relayer (0/1)",
                registry,
            )
            .unwrap(),
            inturn_interval_start: register_int_gauge_with_registry!(
                "relayer_inturn_interval_start",
                "Start of the current in-turn relay interval, unix seconds",
                registry,
            )
            .unwrap(),
            inturn_interval_end: register_int_gauge_with_registry!(
                "relayer_inturn_interval_end",
                "End of the current in-turn relay interval, unix seconds",
                registry,
            )
            .unwrap(),
            next_receive_sequence: register_int_gauge_vec_with_registry!(
                "relayer_next_receive_sequence",
                "Next oracle sequence the destination will accept, by channel",
                &["channel"],
                registry,
            )
            .unwrap(),
            next_send_sequence: register_int_gauge_vec_with_registry!(
                "relayer_next_send_sequence",
                "Next sequence the source chain will emit, by channel",
                &["channel"],
                registry,
            )
            .unwrap(),
            has_tx_delay: register_int_gauge_with_registry!(
                "relayer_has_tx_delay",
                "Whether any pending package is older than the delay threshold (0/1)",
                registry,
            )
            .unwrap(),
            processed_block_height: register_int_gauge_with_registry!(
                "relayer_processed_block_height",
                "Source block height of the most recently claimed batch",
                registry,
            )
            .unwrap(),
            claims_submitted: register_int_counter_with_registry!(
                "relayer_claims_submitted",
                "Total number of claim transactions accepted by the destination",
                registry,
            )
            .unwrap(),
            err_claim_submission: register_int_counter_with_registry!(
                "relayer_err_claim_submission",
                "Total number of rejected or failed claim broadcasts",
                registry,
            )
            .unwrap(),
            err_signature_aggregation: register_int_counter_with_registry!(
                "relayer_err_signature_aggregation",
                "Total number of vote aggregation failures",
                registry,
            )
            .unwrap(),
            rpc_errors: register_int_counter_vec_with_registry!(
                "relayer_rpc_errors",
                "Total number of RPC failures, by method",
                &["method"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }

    pub fn set_inturn(&self, is_inturn: bool, interval: RelayInterval) {
        self.inturn_relayer.set(is_inturn as i64);
        self.inturn_interval_start.set(interval.start as i64);
        self.inturn_interval_end.set(interval.end as i64);
    }

    pub fn set_next_receive_sequence(&self, channel_id: ChannelId, sequence: u64) {
        self.next_receive_sequence
            .with_label_values(&[&channel_id.to_string()])
            .set(sequence as i64);
    }

    pub fn set_next_send_sequence(&self, channel_id: ChannelId, sequence: u64) {
        self.next_send_sequence
            .with_label_values(&[&channel_id.to_string()])
            .set(sequence as i64);
    }

    pub fn set_has_tx_delay(&self, delayed: bool) {
        self.has_tx_delay.set(delayed as i64);
    }

    pub fn set_processed_block_height(&self, height: u64) {
        self.processed_block_height.set(height as i64);
    }

    pub fn record_rpc_error(&self, method: &str) {
        self.rpc_errors.with_label_values(&[method]).inc();
    }
}
