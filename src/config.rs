use anyhow::{Context, Result};
use std::env;

const DEFAULT_DATASET_ID: &str = "sales_data";
const DEFAULT_TABLE_ID: &str = "advertising_metrics";
const DEFAULT_STAGING_PREFIX: &str = "staging";

/// Warehouse destination and staging settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// GCS prefix under which staged Parquet files are written before the
    /// load job picks them up.
    pub staging_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let project_id = env::var("GOOGLE_CLOUD_PROJECT")
            .context("Please set env var GOOGLE_CLOUD_PROJECT")?;
        let dataset_id =
            env::var("SALESPULSE_DATASET").unwrap_or_else(|_| DEFAULT_DATASET_ID.to_string());
        let table_id =
            env::var("SALESPULSE_TABLE").unwrap_or_else(|_| DEFAULT_TABLE_ID.to_string());
        let staging_prefix = env::var("SALESPULSE_STAGING_PREFIX")
            .unwrap_or_else(|_| DEFAULT_STAGING_PREFIX.to_string());

        Ok(Self {
            project_id,
            dataset_id,
            table_id,
            staging_prefix: staging_prefix.trim_end_matches('/').to_string(),
        })
    }
}
