//! `veld worker` - run one event worker plus the periodic observer.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;

use veld_flow::{Observer, SubprocessNdviTool, TaskContext, TaskRegistry, Worker};

use crate::config::Config;
use crate::WorkerArgs;

/// Connects the backing services and runs the loop until interrupted.
pub async fn execute(args: WorkerArgs, config: &Config) -> Result<()> {
    if let Some(name) = &args.name {
        tracing::info!(name = %name, "starting worker");
    }

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .context("failed to create scratch directory")?;

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install metrics exporter")?;
        tracing::info!(addr = %addr, "metrics exporter listening");
    }

    let store = super::build_store(config).await?;
    let blobs = super::build_blobs(config, Arc::clone(&store)).await?;
    let satellite = super::build_satellite(config).await;

    let mut ndvi = SubprocessNdviTool::new(&config.ndvi_tool);
    if let Some(script) = &config.ndvi_script {
        ndvi = ndvi.with_leading_arg(script);
    }

    let ctx = Arc::new(
        TaskContext::new(Arc::clone(&store), blobs, satellite, Arc::new(ndvi))
            .with_scratch_root(&config.scratch_dir)
            .with_recent_tile_window(config.recent_tile_window),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let worker = Worker::new(ctx, TaskRegistry::standard());
    let observer = Observer::new(store);
    tokio::join!(worker.run(shutdown_rx.clone()), observer.run(shutdown_rx));
    Ok(())
}
