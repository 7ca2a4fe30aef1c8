use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Builder, StringArray},
    csv::ReaderBuilder,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{io::Cursor, sync::Arc};
use tracing::info;

use crate::schema::{input_schema, INPUT_COLUMNS};

const CSV_BATCH_SIZE: usize = 8192;

/// Trim whitespace + strip outer quotes if present.
fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse CSV bytes into a `RecordBatch` holding the four required columns
/// (`TV, Radio, Newspaper, Sales`) as nullable `Float64`, in that order.
///
/// The header row decides which column is which; any extra columns are
/// dropped since the warehouse schema is fixed. A missing required column is
/// an error. Cells that are empty or fail to parse as a number become null.
pub fn parse_csv(data: &[u8]) -> Result<RecordBatch> {
    let header_line = data
        .split(|&b| b == b'\n')
        .next()
        .ok_or_else(|| anyhow!("empty CSV input"))?;
    let header_line =
        std::str::from_utf8(header_line).context("CSV header is not valid UTF-8")?;
    let headers: Vec<String> = header_line.trim_end().split(',').map(clean_str).collect();

    for required in INPUT_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(anyhow!("input CSV is missing required column {required}"));
        }
    }

    // Read every column as Utf8 first, then convert just the ones we keep.
    let fields: Vec<Field> = headers
        .iter()
        .map(|n| Field::new(n, DataType::Utf8, true))
        .collect();
    let raw_schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(raw_schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(Cursor::new(data))
        .context("creating CSV reader")?;

    let batches: Vec<RecordBatch> = reader
        .collect::<Result<Vec<_>, _>>()
        .context("reading CSV records")?;
    let raw = arrow::compute::concat_batches(&raw_schema, &batches)
        .context("concatenating CSV batches")?;

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(INPUT_COLUMNS.len());
    for name in INPUT_COLUMNS {
        let arr = raw
            .column_by_name(name)
            .ok_or_else(|| anyhow!("column {name} vanished after parse"))?;
        let sarr = arr
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("column {name} is not a string column"))?;

        let mut b = Float64Builder::with_capacity(sarr.len());
        for opt in sarr.iter() {
            let v = opt.and_then(|s| {
                let c = clean_str(s);
                if c.is_empty() {
                    None
                } else {
                    c.parse::<f64>().ok()
                }
            });
            b.append_option(v);
        }
        columns.push(Arc::new(b.finish()) as ArrayRef);
    }

    let batch = RecordBatch::try_new(input_schema(), columns)
        .context("building input record batch")?;
    info!(rows = batch.num_rows(), "parsed input table");
    Ok(batch)
}
