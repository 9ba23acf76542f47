use std::sync::Arc;

use anyhow::Result;
use meter_core::RawReading;
use reconciliation_service::{
    api,
    config::AppConfig,
    metrics_server, observability,
    pipeline::Pipeline,
    sinks::StoreSink,
    sources::HttpJsonSource,
    store::ReadingStore,
    transform,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr);
    }

    let store = ReadingStore::new();

    let source = HttpJsonSource::new(&cfg.ingest.http_bind_addr, cfg.ingest.channel_capacity)
        .await?;
    let sink = StoreSink::new(store.clone(), cfg.store.append_batch_size);

    let pipeline: Pipeline<_, RawReading, _> = Pipeline {
        source,
        transforms: vec![Arc::new(transform::ReadingValidation::default())],
        sink,
    };

    tracing::info!(
        ingest = %cfg.ingest.http_bind_addr,
        api = %cfg.api.bind_addr,
        "reconciliation service starting"
    );

    // Ingest pipeline and query API run side by side over the same store.
    tokio::try_join!(
        async { pipeline.run().await.map_err(anyhow::Error::from) },
        api::serve(&cfg.api.bind_addr, store),
    )?;

    Ok(())
}
