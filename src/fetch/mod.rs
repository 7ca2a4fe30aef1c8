use anyhow::{Context, Result};
use google_cloud_storage::client::Client;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use tracing::info;

/// Download the full contents of `gs://{bucket}/{object}` into memory.
pub async fn download_blob(client: &Client, bucket: &str, object: &str) -> Result<Vec<u8>> {
    let request = GetObjectRequest {
        bucket: bucket.to_string(),
        object: object.to_string(),
        ..Default::default()
    };

    let data = client
        .download_object(&request, &Range(None, None))
        .await
        .with_context(|| format!("downloading gs://{}/{}", bucket, object))?;

    info!(bucket, object, bytes = data.len(), "downloaded blob");
    Ok(data)
}
