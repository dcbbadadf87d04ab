// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use gnfd_relayer::config::{EnvSecretStore, RelayerNodeConfig};
use gnfd_relayer::node::run_relayer_node;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = env!("CARGO_BIN_NAME"))]
struct Args {
    #[clap(long)]
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = RelayerNodeConfig::load(&args.config_path)?;

    let prometheus_registry = prometheus::Registry::new();

    // Init logging
    let (_log_guard, _filter_handle) = telemetry_subscribers::TelemetryConfig::new(env!("CARGO_BIN_NAME"))
        .with_env()
        .with_prom_registry(&prometheus_registry)
        .init();

    info!("configured metrics port: {}", config.metrics_port);

    let cancel = CancellationToken::new();
    let handles = run_relayer_node(config, &EnvSecretStore, &prometheus_registry, cancel.clone())
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping between passes");
    cancel.cancel();

    for handle in handles {
        handle
            .await
            .map_err(|e| anyhow::anyhow!("task join error: {e}"))?;
    }
    Ok(())
}
