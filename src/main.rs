use anyhow::{Context, Result};
use clap::Parser;
use google_cloud_bigquery::client::{Client as BqClient, ClientConfig as BqConfig};
use google_cloud_storage::client::{Client as StorageClient, ClientConfig as StorageConfig};
use salespulse::{config::Config, pipeline};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Pull an advertising-spend CSV from GCS, enrich it, and append it to the
/// BigQuery metrics table.
#[derive(Parser, Debug)]
struct Args {
    /// GCS bucket holding the source CSV
    bucket: String,

    /// Object name of the CSV within the bucket
    file_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let args = Args::parse();
    let cfg = Config::from_env()?;
    info!(
        project = %cfg.project_id,
        dataset = %cfg.dataset_id,
        table = %cfg.table_id,
        "configuration"
    );

    // ─── 2) construct clients once, pass them down ───────────────────
    let storage_cfg = StorageConfig::default()
        .with_auth()
        .await
        .context("authenticating GCS client")?;
    let storage_client = StorageClient::new(storage_cfg);

    let (bq_cfg, _) = BqConfig::new_with_auth()
        .await
        .context("authenticating BigQuery client")?;
    let bq_client = BqClient::new(bq_cfg).await?;

    // ─── 3) run the pipeline ─────────────────────────────────────────
    pipeline::pull_from_bucket(
        &storage_client,
        &bq_client,
        &cfg,
        &args.bucket,
        &args.file_name,
    )
    .await?;

    Ok(())
}
