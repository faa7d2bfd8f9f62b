//! Tabular reporting of scored customers and per-segment summaries

use polars::prelude::*;

use crate::cltv::ScoredCustomer;
use crate::outlier::OutlierThresholds;

/// Scored customers as a DataFrame, one row per customer
pub fn scored_frame(customers: &[ScoredCustomer]) -> crate::Result<DataFrame> {
    let frame = df!(
        "master_id" => customers.iter().map(|c| c.master_id.as_str()).collect::<Vec<_>>(),
        "recency_cltv_weekly" => customers.iter().map(|c| c.recency_weeks).collect::<Vec<_>>(),
        "T_weekly" => customers.iter().map(|c| c.tenure_weeks).collect::<Vec<_>>(),
        "frequency" => customers.iter().map(|c| c.frequency).collect::<Vec<_>>(),
        "monetary_cltv_avg" => customers.iter().map(|c| c.monetary_avg).collect::<Vec<_>>(),
        "exp_sales" => customers.iter().map(|c| c.exp_sales).collect::<Vec<_>>(),
        "exp_average_value" => customers.iter().map(|c| c.exp_average_value).collect::<Vec<_>>(),
        "cltv" => customers.iter().map(|c| c.cltv).collect::<Vec<_>>(),
        "segment" => customers
            .iter()
            .map(|c| c.segment.map(|s| s.as_str()))
            .collect::<Vec<_>>()
    )?;
    Ok(frame)
}

/// Per-segment aggregates of CLTV, frequency, spend and recency, ordered
/// C, B, A
pub fn segment_summary(frame: &DataFrame) -> crate::Result<DataFrame> {
    let summary = frame
        .clone()
        .lazy()
        .filter(col("segment").is_not_null())
        .group_by([col("segment")])
        .agg([
            len().alias("customers"),
            col("cltv").mean().alias("cltv_mean"),
            col("cltv").min().alias("cltv_min"),
            col("cltv").max().alias("cltv_max"),
            col("frequency").mean().alias("frequency_mean"),
            col("frequency").min().alias("frequency_min"),
            col("frequency").max().alias("frequency_max"),
            col("frequency").sum().alias("frequency_sum"),
            col("monetary_cltv_avg").mean().alias("monetary_cltv_avg_mean"),
            col("monetary_cltv_avg").min().alias("monetary_cltv_avg_min"),
            col("monetary_cltv_avg").max().alias("monetary_cltv_avg_max"),
            col("monetary_cltv_avg").sum().alias("monetary_cltv_avg_sum"),
            col("recency_cltv_weekly").mean().alias("recency_cltv_weekly_mean"),
            col("recency_cltv_weekly").min().alias("recency_cltv_weekly_min"),
            col("recency_cltv_weekly").max().alias("recency_cltv_weekly_max"),
        ])
        .sort(
            ["segment"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .collect()?;

    Ok(summary)
}

/// Print the outlier limits used for each capped column
pub fn print_thresholds(thresholds: &[OutlierThresholds]) {
    println!("=== Outlier Limits ===");
    for t in thresholds {
        println!(
            "{:<36} low={:>12.4} up={:>12.4} cap={:>10} capped={}",
            t.column, t.low, t.up, t.cap, t.capped
        );
    }
}
