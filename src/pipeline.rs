use anyhow::Result;
use google_cloud_bigquery::client::Client as BqClient;
use google_cloud_storage::client::Client as StorageClient;
use tracing::{info, instrument};

use crate::config::Config;
use crate::{fetch, load, process};

/// Run the full pipeline for one file: pull the CSV from the bucket, enrich
/// it, and append the result to the warehouse table. Returns the number of
/// rows the load job reports written.
///
/// Any stage failure propagates; there is no partial commit, either the whole
/// enriched table lands or nothing does.
#[instrument(level = "info", skip(storage, bq, cfg))]
pub async fn pull_from_bucket(
    storage: &StorageClient,
    bq: &BqClient,
    cfg: &Config,
    bucket: &str,
    file_name: &str,
) -> Result<i64> {
    let data = fetch::download_blob(storage, bucket, file_name).await?;
    let table = process::table::parse_csv(&data)?;
    let enriched = process::enrich::enrich(&table)?;
    let rows = load::append_to_warehouse(storage, bq, cfg, bucket, file_name, &enriched).await?;

    info!(
        rows,
        "Loaded {} rows into {}:{}", rows, cfg.dataset_id, cfg.table_id
    );
    Ok(rows)
}
