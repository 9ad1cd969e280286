//! Turn a raw data source index into an enriched events index, one batch at a time.
use anyhow::Context;
use envconfig::Envconfig;
use events_worker::config::Config;
use events_worker::metrics::{serve, setup_metrics_recorder, setup_metrics_router};
use events_worker::pipeline::Pipeline;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env().context("invalid configuration")?;

    let recorder_handle = setup_metrics_recorder().context("failed to install metrics recorder")?;
    let bind = config.bind();
    tokio::task::spawn(async move {
        let router = setup_metrics_router(recorder_handle);
        if let Err(e) = serve(router, &bind).await {
            error!("failed to serve metrics on {}: {}", bind, e);
        }
    });

    let pipeline = Pipeline::from_config(&config).context("failed to set up pipeline")?;
    let summary = pipeline.run().await.context("pipeline run failed")?;

    info!(
        records_read = summary.records_read,
        rows_written = summary.rows_written,
        batches = summary.batches,
        "Shutting down"
    );
    Ok(())
}
