use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use google_cloud_bigquery::client::Client as BqClient;
use google_cloud_bigquery::http::job::get::GetJobRequest;
use google_cloud_bigquery::http::job::{
    Job, JobConfiguration, JobConfigurationLoad, JobReference, JobState, JobType,
    WriteDisposition,
};
use google_cloud_bigquery::http::table::{SourceFormat, TableReference};
use google_cloud_storage::client::Client as StorageClient;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::schema::bigquery_schema;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Encode a record batch as a Parquet file in memory.
pub fn batch_to_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let cursor = Cursor::new(&mut buffer);

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(cursor, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    Ok(buffer)
}

/// Upload staged Parquet bytes to `gs://{bucket}/{object}`.
async fn upload_to_gcs(
    client: &StorageClient,
    bucket: &str,
    object: &str,
    data: Vec<u8>,
) -> Result<()> {
    let upload_type = UploadType::Simple(Media::new(object.to_string()));
    let request = UploadObjectRequest {
        bucket: bucket.to_string(),
        ..Default::default()
    };

    client
        .upload_object(&request, data, &upload_type)
        .await
        .with_context(|| format!("uploading gs://{}/{}", bucket, object))?;

    info!(bucket, object, "staged parquet in GCS");
    Ok(())
}

/// Run a `WRITE_APPEND` Parquet load job against the destination table and
/// block until BigQuery reports it done. Returns the row count the job wrote.
async fn run_load_job(client: &BqClient, cfg: &Config, source_uri: String) -> Result<i64> {
    let job_id = format!(
        "salespulse_load_{}",
        chrono::Utc::now().timestamp_millis()
    );

    let load = JobConfigurationLoad {
        source_uris: vec![source_uri.clone()],
        source_format: Some(SourceFormat::Parquet),
        write_disposition: Some(WriteDisposition::WriteAppend),
        schema: Some(bigquery_schema()),
        destination_table: TableReference {
            project_id: cfg.project_id.clone(),
            dataset_id: cfg.dataset_id.clone(),
            table_id: cfg.table_id.clone(),
        },
        ..Default::default()
    };
    let job = Job {
        job_reference: JobReference {
            project_id: cfg.project_id.clone(),
            job_id: job_id.clone(),
            location: None,
        },
        configuration: JobConfiguration {
            job: JobType::Load(load),
            ..Default::default()
        },
        ..Default::default()
    };

    info!(job_id, uri = %source_uri, "submitting load job");
    let mut job = client
        .job()
        .create(&job)
        .await
        .with_context(|| format!("creating load job {job_id}"))?;

    while job.status.state != JobState::Done {
        debug!(job_id, state = ?job.status.state, "load job running");
        tokio::time::sleep(POLL_INTERVAL).await;
        job = client
            .job()
            .get(&cfg.project_id, &job_id, &GetJobRequest::default())
            .await
            .with_context(|| format!("polling load job {job_id}"))?;
    }

    if let Some(err) = job.status.error_result {
        return Err(anyhow!("load job {} failed: {:?}", job_id, err));
    }

    let output_rows = job
        .statistics
        .and_then(|s| s.load)
        .and_then(|l| l.output_rows)
        .unwrap_or(0);
    Ok(output_rows)
}

/// Append an enriched table to the warehouse: Parquet-encode it, stage the
/// bytes next to the source data, then load the staged object into BigQuery.
pub async fn append_to_warehouse(
    storage: &StorageClient,
    bq: &BqClient,
    cfg: &Config,
    bucket: &str,
    file_name: &str,
    batch: &RecordBatch,
) -> Result<i64> {
    let parquet = batch_to_parquet(batch)?;
    debug!(bytes = parquet.len(), "encoded enriched table as parquet");

    let stem = file_name.trim_end_matches(".csv");
    let object = format!(
        "{}/{}-{}.parquet",
        cfg.staging_prefix,
        stem,
        chrono::Utc::now().timestamp()
    );
    upload_to_gcs(storage, bucket, &object, parquet).await?;

    let uri = format!("gs://{}/{}", bucket, object);
    let rows = run_load_job(bq, cfg, uri).await?;

    info!(
        rows,
        dataset = %cfg.dataset_id,
        table = %cfg.table_id,
        "load job complete"
    );
    Ok(rows)
}
