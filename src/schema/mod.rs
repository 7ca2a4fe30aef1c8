use arrow::datatypes::{DataType, Field, Schema};
use google_cloud_bigquery::http::table::{
    TableFieldMode, TableFieldSchema, TableFieldType, TableSchema,
};
use std::sync::Arc;

/// The four columns every input file must carry.
pub const INPUT_COLUMNS: [&str; 4] = ["TV", "Radio", "Newspaper", "Sales"];

/// The warehouse column set, in load order: the four inputs followed by the
/// nine derived features.
pub const ENRICHED_COLUMNS: [&str; 13] = [
    "TV",
    "Radio",
    "Newspaper",
    "Sales",
    "Total_Spend",
    "TV_Percentage",
    "Radio_Percentage",
    "Newspaper_Percentage",
    "TV_Radio_Interaction",
    "TV_Newspaper_Interaction",
    "Log_Sales",
    "Log_TV",
    "ROAS",
];

fn float_schema(names: &[&str]) -> Arc<Schema> {
    let fields: Vec<Field> = names
        .iter()
        .map(|n| Field::new(*n, DataType::Float64, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Arrow schema of a parsed input table: the four columns, nullable f64.
pub fn input_schema() -> Arc<Schema> {
    float_schema(&INPUT_COLUMNS)
}

/// Arrow schema of an enriched table, matching the warehouse table exactly.
pub fn enriched_schema() -> Arc<Schema> {
    float_schema(&ENRICHED_COLUMNS)
}

/// BigQuery schema for the destination table: every column FLOAT, NULLABLE.
pub fn bigquery_schema() -> TableSchema {
    let fields = ENRICHED_COLUMNS
        .iter()
        .map(|n| TableFieldSchema {
            name: n.to_string(),
            data_type: TableFieldType::Float,
            mode: Some(TableFieldMode::Nullable),
            ..Default::default()
        })
        .collect();
    TableSchema { fields }
}
