//! CLTVForge: customer lifetime value CLI using BG/NBD and Gamma-Gamma models
//!
//! This is the main entrypoint that orchestrates data loading, inspection,
//! model fitting, scoring and the per-segment report.

use anyhow::Result;
use clap::Parser;
use cltvforge::{data, pipeline, report, Args};
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    // Wide tables, as the summary has many aggregate columns
    std::env::set_var("POLARS_FMT_MAX_COLS", "-1");
    std::env::set_var("POLARS_TABLE_WIDTH", "500");

    let config = args.resolve_config()?;
    info!(
        input = %args.input,
        today = %config.today,
        horizon_weeks = config.forecast.purchase_horizon_weeks,
        months = config.forecast.cltv_months,
        discount_rate = config.forecast.discount_rate,
        "Starting CLTV pipeline"
    );

    println!("=== CLTV Prediction Pipeline ===\n");
    let start_time = Instant::now();

    // Step 1: Load data
    let df = data::load_dataset(&args.input)?;
    println!("✓ Data loaded: {} customers", df.height());

    // Step 2: Inspect
    if !args.skip_inspect {
        data::print_overview(&df, config.inspect.head, &config.inspect.quantiles)?;
    }

    // Steps 3-9: cap, derive, fit, score, segment
    let fit_start = Instant::now();
    let output = pipeline::run(df, &config)?;
    let fit_time = fit_start.elapsed();

    if args.verbose {
        println!();
        report::print_thresholds(&output.thresholds);
    }

    println!("\n=== Fitted Models ===");
    println!("{}", output.scores.purchase_model);
    println!("{}", output.scores.spend_model);
    println!(
        "✓ Scored {} customers ({} single-order customers excluded)",
        output.scores.customers.len(),
        output.scores.excluded
    );
    if args.verbose {
        println!("  Fitting time: {:.2}s", fit_time.as_secs_f64());
        println!("  Segment edges: {:?}", output.segment_edges);
        println!("\n{}", output.scored.head(Some(config.inspect.head)));
    }

    // Step 10: Segment summary
    println!("\n=== Segment Summary ===");
    println!("{}", output.summary);

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "cltvforge=debug" } else { "cltvforge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
