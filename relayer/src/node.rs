// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::assembler::{BscAssembler, SystemClock};
use crate::bsc_executor::{BscClient, BscContractClient};
use crate::config::{RelayerNodeConfig, SecretStore};
use crate::greenfield_executor::GreenfieldExecutor;
use crate::metrics::RelayerMetrics;
use crate::retry::RetryPolicy;
use anyhow::Context;
use gnfd_relayer_pg_db::store::PgSequenceStore;
use gnfd_relayer_pg_db::{Db, DbArgs};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// Wire up storage, executors and the assembler, and start the two worker
/// tasks: the validator-cache refresh loop and the assembler loop.
pub async fn run_relayer_node(
    config: RelayerNodeConfig,
    secret_store: &dyn SecretStore,
    prometheus_registry: &prometheus::Registry,
    cancel: CancellationToken,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let metrics = Arc::new(RelayerMetrics::new(prometheus_registry));

    let keys = config
        .resolve_keys(secret_store)
        .context("failed to load relayer key material")?;
    info!("relayer account address: {}", keys.account.address());

    let db_url: Url = config.db.url.parse().context("invalid database url")?;
    let db = Db::for_write(db_url, DbArgs::default())
        .await
        .context("failed to connect to the relayer database")?;
    db.run_migrations().await?;
    let store = Arc::new(PgSequenceStore::new(db));

    let bsc_inner = BscContractClient::connect(
        &config.bsc.rpc_url,
        &config.bsc.cross_chain_contract_address,
        config.bsc.chain_id,
    )
    .await
    .context("failed to connect to the BSC node")?;
    let bsc = Arc::new(BscClient::new(
        bsc_inner,
        RetryPolicy::new(config.relay.retry_attempts, config.relay.retry_delay()),
        metrics.clone(),
    ));

    let greenfield = Arc::new(GreenfieldExecutor::build(
        config.greenfield.clone(),
        config.bsc.chain_id,
        keys.account,
        keys.bls,
        metrics.clone(),
    ));

    // Warm the validator cache before the first pass; the assembler never
    // aggregates against an empty snapshot.
    greenfield.refresh_validators_until_success().await;

    let mut handles = Vec::new();

    let refresh_interval = config.relay.update_cached_validators_interval();
    let refresh_cancel = cancel.child_token();
    let refresh_client = greenfield.clone();
    handles.push(tokio::spawn(async move {
        refresh_client
            .update_cached_validators_loop(refresh_interval, refresh_cancel)
            .await;
    }));

    let assembler = BscAssembler::new(
        config.relay.clone(),
        store,
        bsc,
        greenfield,
        config.bsc.chain_id,
        metrics,
        Arc::new(SystemClock),
    );
    let assembler_cancel = cancel.child_token();
    handles.push(tokio::spawn(async move {
        assembler.run(assembler_cancel).await;
    }));

    info!("relayer node started");
    Ok(handles)
}
