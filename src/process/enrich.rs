use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Float64Builder},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::schema::{enriched_schema, INPUT_COLUMNS};

fn spend_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("input table is missing required column {name}"))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow!("column {name} is not Float64"))
}

/// Append the nine derived feature columns to a table of spend/sales records.
///
/// Pure and idempotent: row count and order are untouched, the four input
/// columns pass through unchanged, and re-running on an already-enriched
/// table recomputes the same values. Null inputs propagate to null outputs;
/// the percentage and ROAS columns substitute exactly `0` when
/// `Total_Spend` is zero so zero-spend rows never divide by zero.
pub fn enrich(batch: &RecordBatch) -> Result<RecordBatch> {
    let tv = spend_column(batch, "TV")?;
    let radio = spend_column(batch, "Radio")?;
    let newspaper = spend_column(batch, "Newspaper")?;
    let sales = spend_column(batch, "Sales")?;

    let rows = batch.num_rows();
    let mut total_b = Float64Builder::with_capacity(rows);
    let mut tv_pct_b = Float64Builder::with_capacity(rows);
    let mut radio_pct_b = Float64Builder::with_capacity(rows);
    let mut news_pct_b = Float64Builder::with_capacity(rows);
    let mut tv_radio_b = Float64Builder::with_capacity(rows);
    let mut tv_news_b = Float64Builder::with_capacity(rows);
    let mut log_sales_b = Float64Builder::with_capacity(rows);
    let mut log_tv_b = Float64Builder::with_capacity(rows);
    let mut roas_b = Float64Builder::with_capacity(rows);

    for i in 0..rows {
        let tv = (!tv.is_null(i)).then(|| tv.value(i));
        let radio = (!radio.is_null(i)).then(|| radio.value(i));
        let newspaper = (!newspaper.is_null(i)).then(|| newspaper.value(i));
        let sales = (!sales.is_null(i)).then(|| sales.value(i));

        // null + number = null
        let total = match (tv, radio, newspaper) {
            (Some(t), Some(r), Some(n)) => Some(t + r + n),
            _ => None,
        };

        // share of total, with an exact 0 on zero spend (null totals stay null)
        let share = |x: Option<f64>| match total {
            Some(t) if t != 0.0 => x.map(|v| v / t),
            Some(_) => Some(0.0),
            None => None,
        };

        total_b.append_option(total);
        tv_pct_b.append_option(share(tv));
        radio_pct_b.append_option(share(radio));
        news_pct_b.append_option(share(newspaper));
        tv_radio_b.append_option(tv.zip(radio).map(|(t, r)| t * r));
        tv_news_b.append_option(tv.zip(newspaper).map(|(t, n)| t * n));
        // ln(x + 1); values at or below -1 degrade to -inf/NaN like
        // vectorized math instead of raising
        log_sales_b.append_option(sales.map(|s| (s + 1.0).ln()));
        log_tv_b.append_option(tv.map(|t| (t + 1.0).ln()));
        roas_b.append_option(share(sales));
    }

    let columns: Vec<ArrayRef> = INPUT_COLUMNS
        .iter()
        .map(|name| {
            batch
                .column_by_name(name)
                .expect("presence checked above")
                .clone()
        })
        .chain([
            Arc::new(total_b.finish()) as ArrayRef,
            Arc::new(tv_pct_b.finish()) as ArrayRef,
            Arc::new(radio_pct_b.finish()) as ArrayRef,
            Arc::new(news_pct_b.finish()) as ArrayRef,
            Arc::new(tv_radio_b.finish()) as ArrayRef,
            Arc::new(tv_news_b.finish()) as ArrayRef,
            Arc::new(log_sales_b.finish()) as ArrayRef,
            Arc::new(log_tv_b.finish()) as ArrayRef,
            Arc::new(roas_b.finish()) as ArrayRef,
        ])
        .collect();

    RecordBatch::try_new(enriched_schema(), columns).context("building enriched record batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::input_schema;

    const EPS: f64 = 1e-9;

    fn batch_of(rows: &[[Option<f64>; 4]]) -> RecordBatch {
        let columns: Vec<ArrayRef> = (0..4)
            .map(|c| {
                Arc::new(rows.iter().map(|r| r[c]).collect::<Float64Array>()) as ArrayRef
            })
            .collect();
        RecordBatch::try_new(input_schema(), columns).unwrap()
    }

    fn value(batch: &RecordBatch, name: &str, row: usize) -> Option<f64> {
        let arr = batch
            .column_by_name(name)
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        (!arr.is_null(row)).then(|| arr.value(row))
    }

    #[test]
    fn worked_example_row() -> Result<()> {
        let out = enrich(&batch_of(&[[
            Some(230.1),
            Some(37.8),
            Some(69.2),
            Some(22.1),
        ]]))?;

        assert!((value(&out, "Total_Spend", 0).unwrap() - 337.1).abs() < EPS);
        assert!((value(&out, "TV_Percentage", 0).unwrap() - 0.6829).abs() < 1e-4);
        assert!((value(&out, "Radio_Percentage", 0).unwrap() - 0.1122).abs() < 1e-4);
        assert!((value(&out, "Newspaper_Percentage", 0).unwrap() - 0.2053).abs() < 1e-4);
        assert!((value(&out, "TV_Radio_Interaction", 0).unwrap() - 8697.78).abs() < 1e-6);
        assert!((value(&out, "TV_Newspaper_Interaction", 0).unwrap() - 15926.92).abs() < 1e-6);
        assert!((value(&out, "ROAS", 0).unwrap() - 0.0656).abs() < 1e-4);
        assert!((value(&out, "Log_TV", 0).unwrap() - 5.4434).abs() < 1e-4);
        assert!((value(&out, "Log_Sales", 0).unwrap() - 3.1390).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn zero_spend_substitutes_exact_zero() -> Result<()> {
        let out = enrich(&batch_of(&[[Some(0.0), Some(0.0), Some(0.0), Some(5.0)]]))?;

        assert_eq!(value(&out, "Total_Spend", 0), Some(0.0));
        assert_eq!(value(&out, "TV_Percentage", 0), Some(0.0));
        assert_eq!(value(&out, "Radio_Percentage", 0), Some(0.0));
        assert_eq!(value(&out, "Newspaper_Percentage", 0), Some(0.0));
        assert_eq!(value(&out, "ROAS", 0), Some(0.0));
        assert_eq!(value(&out, "Log_TV", 0), Some(0.0));
        Ok(())
    }

    #[test]
    fn null_spend_propagates() -> Result<()> {
        let out = enrich(&batch_of(&[[None, Some(10.0), Some(5.0), Some(3.0)]]))?;

        assert_eq!(value(&out, "Total_Spend", 0), None);
        assert_eq!(value(&out, "TV_Percentage", 0), None);
        assert_eq!(value(&out, "Radio_Percentage", 0), None);
        assert_eq!(value(&out, "ROAS", 0), None);
        assert_eq!(value(&out, "TV_Radio_Interaction", 0), None);
        assert_eq!(value(&out, "Log_TV", 0), None);
        // Sales is present, so its log still computes
        assert!((value(&out, "Log_Sales", 0).unwrap() - 4.0_f64.ln()).abs() < EPS);
        Ok(())
    }

    #[test]
    fn percentages_sum_to_one_when_spend_is_nonzero() -> Result<()> {
        let rows = [
            [Some(230.1), Some(37.8), Some(69.2), Some(22.1)],
            [Some(44.5), Some(39.3), Some(45.1), Some(10.4)],
            [Some(17.2), Some(45.9), Some(69.3), Some(9.3)],
        ];
        let out = enrich(&batch_of(&rows))?;

        for row in 0..rows.len() {
            let sum = value(&out, "TV_Percentage", row).unwrap()
                + value(&out, "Radio_Percentage", row).unwrap()
                + value(&out, "Newspaper_Percentage", row).unwrap();
            assert!((sum - 1.0).abs() < EPS);
        }
        Ok(())
    }

    #[test]
    fn preserves_rows_and_input_columns() -> Result<()> {
        let input = batch_of(&[
            [Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            [Some(0.0), Some(0.0), Some(0.0), Some(0.0)],
            [None, None, None, None],
        ]);
        let out = enrich(&input)?;

        assert_eq!(out.num_rows(), input.num_rows());
        assert_eq!(out.num_columns(), 13);
        for name in INPUT_COLUMNS {
            assert_eq!(
                out.column_by_name(name).unwrap().as_ref(),
                input.column_by_name(name).unwrap().as_ref()
            );
        }
        Ok(())
    }

    #[test]
    fn enriching_twice_is_a_fixpoint() -> Result<()> {
        let once = enrich(&batch_of(&[
            [Some(230.1), Some(37.8), Some(69.2), Some(22.1)],
            [Some(0.0), Some(0.0), Some(0.0), Some(5.0)],
        ]))?;
        let twice = enrich(&once)?;
        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn log_of_values_below_minus_one_degrades_not_errors() -> Result<()> {
        let out = enrich(&batch_of(&[[Some(-2.0), Some(1.0), Some(1.0), Some(-1.0)]]))?;

        assert!(value(&out, "Log_TV", 0).unwrap().is_nan());
        assert_eq!(value(&out, "Log_Sales", 0), Some(f64::NEG_INFINITY));
        Ok(())
    }
}
