//! Integration tests for CLTVForge

use chrono::{Duration, NaiveDate};
use cltvforge::{add_totals, build_features, load_dataset, run, PipelineConfig, Segment};
use polars::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "master_id,order_channel,last_order_channel,first_order_date,last_order_date,last_order_date_online,last_order_date_offline,order_num_total_ever_online,order_num_total_ever_offline,customer_value_total_ever_offline,customer_value_total_ever_online,interested_in_categories_12";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
}

/// Create a test CSV with 120 synthetic customers plus one known customer
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    let start = NaiveDate::from_ymd_opt(2018, 6, 1).unwrap();
    for i in 0..120usize {
        let (mut online, offline) = if i % 20 == 0 {
            (1usize, 0usize)
        } else {
            (1 + (i * 7) % 6, (i * 5) % 3)
        };
        let first = start + Duration::days(((i * 53) % 900) as i64);
        let available = (today() - first).num_days();
        let span = if online + offline == 1 {
            0
        } else {
            (available - 1).min(available * (1 + (i as i64 * 13) % 10) / 10)
        };
        let last = first + Duration::days(span);
        let mut online_value = (online * (60 + (i * 31) % 90)) as f64 + 0.99;
        let offline_value = (offline * (70 + (i * 17) % 50)) as f64;

        // One heavy buyer to exercise outlier capping
        if i == 7 {
            online = 200;
            online_value = 50_000.0;
        }

        writeln!(
            file,
            "{:08x},Mobile,Offline,{},{},{},{},{}.0,{}.0,{:.2},{:.2},[KADIN]",
            i, first, last, last, first, online, offline, offline_value, online_value
        )
        .unwrap();
    }

    writeln!(
        file,
        "known-customer,Android App,Android App,2021-01-01,2021-03-01,2021-03-01,2021-01-01,3.0,0.0,0.0,300.0,[ERKEK]"
    )
    .unwrap();

    file
}

fn column_f64(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let df = load_dataset(test_file.path()).unwrap();
    assert_eq!(df.height(), 121);

    let output = run(df, &PipelineConfig::default()).unwrap();

    // Every customer gets a feature row; single-order customers are not scored
    assert_eq!(output.features.len(), 121);
    let scored = output.scores.customers.len();
    assert_eq!(scored + output.scores.excluded, 121);
    assert!(output.scores.excluded > 0);

    // Segments partition the scored customers
    assert!(output.scores.customers.iter().all(|c| c.segment.is_some()));
    assert_eq!(output.summary.height(), 3);
    let sizes: i64 = output
        .summary
        .column("customers")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .sum();
    assert_eq!(sizes as usize, scored);

    for customer in &output.scores.customers {
        assert!(customer.exp_sales.is_finite());
        assert!(customer.exp_average_value.is_finite());
        assert!(customer.cltv.is_finite());
    }
}

#[test]
fn test_segment_cltv_ranges_are_ordered() {
    let test_file = create_test_csv();
    let output = run(load_dataset(test_file.path()).unwrap(), &PipelineConfig::default()).unwrap();

    let range = |segment: Segment| {
        output
            .scores
            .customers
            .iter()
            .filter(|c| c.segment == Some(segment))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.cltv), hi.max(c.cltv))
            })
    };
    let (c, b, a) = (range(Segment::C), range(Segment::B), range(Segment::A));
    assert!(c.0 <= c.1 && b.0 <= b.1 && a.0 <= a.1);
    assert!(c.1 <= b.0);
    assert!(b.1 <= a.0);

    let edges = &output.segment_edges;
    assert_eq!(edges.len(), 4);
    assert!(edges.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_known_customer_features() {
    let test_file = create_test_csv();
    let output = run(load_dataset(test_file.path()).unwrap(), &PipelineConfig::default()).unwrap();

    let features = output
        .features
        .rows
        .iter()
        .find(|r| r.master_id == "known-customer")
        .unwrap();
    assert!((features.recency_weeks - 8.43).abs() < 0.01);
    assert_eq!(features.frequency, Some(3.0));
    assert_eq!(features.monetary_avg, 100.0);

    let scored = output
        .scores
        .customers
        .iter()
        .find(|c| c.master_id == "known-customer")
        .unwrap();
    let expected_sales = output.scores.purchase_model.conditional_expected_number_of_purchases_up_to_time(
        24.0,
        3.0,
        features.recency_weeks,
        features.tenure_weeks,
    );
    assert_eq!(scored.exp_sales, expected_sales);
    assert!(scored.cltv.is_finite());
}

#[test]
fn test_outliers_capped_before_totals() {
    let test_file = create_test_csv();
    let output = run(load_dataset(test_file.path()).unwrap(), &PipelineConfig::default()).unwrap();

    let orders = output
        .thresholds
        .iter()
        .find(|t| t.column == "order_num_total_ever_online")
        .unwrap();
    assert_eq!(orders.capped, 1);

    // The heavy buyer's frequency reflects the capped online count
    let heavy = output
        .features
        .rows
        .iter()
        .find(|r| r.master_id == format!("{:08x}", 7))
        .unwrap();
    let frequency = heavy.frequency.unwrap();
    assert!(frequency < 200.0);
    assert!(frequency <= orders.cap + 2.0);
}

#[test]
fn test_totals_are_exact_sums() {
    let test_file = create_test_csv();
    let df = add_totals(load_dataset(test_file.path()).unwrap()).unwrap();

    let online_orders = column_f64(&df, "order_num_total_ever_online");
    let offline_orders = column_f64(&df, "order_num_total_ever_offline");
    let total_transaction = column_f64(&df, "total_transaction");
    let online_value = column_f64(&df, "customer_value_total_ever_online");
    let offline_value = column_f64(&df, "customer_value_total_ever_offline");
    let total_price = column_f64(&df, "total_price");

    for i in 0..df.height() {
        assert_eq!(total_transaction[i], online_orders[i] + offline_orders[i]);
        assert_eq!(total_price[i], offline_value[i] + online_value[i]);
    }
}

#[test]
fn test_frequency_defined_only_for_repeat_customers() {
    let test_file = create_test_csv();
    let df = add_totals(load_dataset(test_file.path()).unwrap()).unwrap();
    let totals = column_f64(&df, "total_transaction");
    let features = build_features(&df, today()).unwrap();

    for (row, total) in features.rows.iter().zip(totals) {
        assert_eq!(row.frequency.is_some(), total > 1.0);
    }
}

#[test]
fn test_reference_date_is_configurable() {
    let test_file = create_test_csv();
    let df = add_totals(load_dataset(test_file.path()).unwrap()).unwrap();

    let june = build_features(&df, today()).unwrap();
    let july = build_features(&df, NaiveDate::from_ymd_opt(2021, 7, 6).unwrap()).unwrap();

    for (a, b) in june.rows.iter().zip(&july.rows) {
        assert!((b.tenure_weeks - a.tenure_weeks - 5.0).abs() < 1e-9);
        assert_eq!(a.recency_weeks, b.recency_weeks);
    }
}

#[test]
fn test_error_handling_missing_file() {
    assert!(load_dataset("/nonexistent/flo_data_20K.csv").is_err());
}

#[test]
fn test_error_handling_missing_column() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "master_id,first_order_date,last_order_date").unwrap();
    writeln!(file, "a,2021-01-01,2021-02-01").unwrap();

    let df = load_dataset(file.path()).unwrap();
    assert!(run(df, &PipelineConfig::default()).is_err());
}
