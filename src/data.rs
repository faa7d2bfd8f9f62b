//! Data loading, inspection and CLTV feature computation using Polars

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use ndarray::Array1;
use polars::prelude::*;
use tracing::{info, warn};

pub const MASTER_ID: &str = "master_id";
pub const ONLINE_ORDERS: &str = "order_num_total_ever_online";
pub const OFFLINE_ORDERS: &str = "order_num_total_ever_offline";
pub const ONLINE_VALUE: &str = "customer_value_total_ever_online";
pub const OFFLINE_VALUE: &str = "customer_value_total_ever_offline";
pub const FIRST_ORDER_DATE: &str = "first_order_date";
pub const LAST_ORDER_DATE: &str = "last_order_date";
pub const TOTAL_TRANSACTION: &str = "total_transaction";
pub const TOTAL_PRICE: &str = "total_price";

/// Date columns converted to calendar dates; the channel-specific ones are
/// optional in the input
pub const DATE_COLUMNS: [&str; 4] = [
    FIRST_ORDER_DATE,
    LAST_ORDER_DATE,
    "last_order_date_online",
    "last_order_date_offline",
];

/// Per-customer features consumed by the BG/NBD and Gamma-Gamma models
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerFeatures {
    pub master_id: String,
    /// Weeks between first and last order
    pub recency_weeks: f64,
    /// Weeks between first order and the reference date
    pub tenure_weeks: f64,
    /// Total order count, only present for repeat customers
    pub frequency: Option<f64>,
    /// Average spend per order
    pub monetary_avg: f64,
}

/// Feature table with one row per customer, in input order
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub rows: Vec<CustomerFeatures>,
}

/// Model inputs for customers with a defined frequency
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    pub customer_ids: Vec<String>,
    pub frequency: Array1<f64>,
    pub recency: Array1<f64>,
    pub tenure: Array1<f64>,
    pub monetary: Array1<f64>,
}

impl CalibrationSet {
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Customers left out of model fitting (a single order or none)
    pub fn excluded(&self) -> usize {
        self.rows.iter().filter(|r| r.frequency.is_none()).count()
    }

    /// Collect the repeat customers into model-ready columns
    pub fn calibration(&self) -> CalibrationSet {
        let eligible: Vec<&CustomerFeatures> =
            self.rows.iter().filter(|r| r.frequency.is_some()).collect();

        CalibrationSet {
            customer_ids: eligible.iter().map(|r| r.master_id.clone()).collect(),
            frequency: eligible.iter().filter_map(|r| r.frequency).collect(),
            recency: eligible.iter().map(|r| r.recency_weeks).collect(),
            tenure: eligible.iter().map(|r| r.tenure_weeks).collect(),
            monetary: eligible.iter().map(|r| r.monetary_avg).collect(),
        }
    }
}

/// Load the customer CSV into a DataFrame
///
/// # Arguments
/// * `file_path` - Path to the CSV file (header row required)
pub fn load_dataset(file_path: impl AsRef<Path>) -> crate::Result<DataFrame> {
    let path = file_path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.height() == 0 {
        anyhow::bail!("No rows found in {}", path.display());
    }

    info!(rows = df.height(), columns = df.width(), path = %path.display(), "Dataset loaded");
    Ok(df)
}

/// Summary statistics per numeric column: count, mean, std, min, the
/// requested quantiles and max
pub fn describe(df: &DataFrame, quantiles: &[f64]) -> crate::Result<DataFrame> {
    let mut names = Vec::new();
    let mut counts = Vec::new();
    let mut means = Vec::new();
    let mut stds = Vec::new();
    let mut mins = Vec::new();
    let mut maxs = Vec::new();
    let mut quantile_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); quantiles.len()];

    for column in df.get_columns() {
        if !matches!(
            column.dtype(),
            DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
        ) {
            continue;
        }
        let values = column.cast(&DataType::Float64)?;
        let values = values.f64()?;

        names.push(column.name().to_string());
        counts.push((values.len() - values.null_count()) as f64);
        means.push(values.mean());
        stds.push(values.std(1));
        mins.push(values.min());
        maxs.push(values.max());
        for (slot, &q) in quantile_values.iter_mut().zip(quantiles) {
            slot.push(values.quantile(q, QuantileMethod::Linear)?);
        }
    }

    let mut columns = vec![
        Column::new("column".into(), names),
        Column::new("count".into(), counts),
        Column::new("mean".into(), means),
        Column::new("std".into(), stds),
        Column::new("min".into(), mins),
    ];
    for (&q, values) in quantiles.iter().zip(quantile_values) {
        columns.push(Column::new(quantile_label(q).into(), values));
    }
    columns.push(Column::new("max".into(), maxs));

    Ok(DataFrame::new(columns)?)
}

fn quantile_label(q: f64) -> String {
    format!("{}%", (q * 1000.0).round() / 10.0)
}

/// Print shape, dtypes, head/tail, null counts, index range and quantiles
pub fn print_overview(df: &DataFrame, head: usize, quantiles: &[f64]) -> crate::Result<()> {
    println!("##################### Shape #####################");
    println!("({}, {})", df.height(), df.width());
    println!("##################### Types #####################");
    for column in df.get_columns() {
        println!("{:<40} {}", column.name().as_str(), column.dtype());
    }
    println!("##################### Head #####################");
    println!("{}", df.head(Some(head)));
    println!("##################### Tail #####################");
    println!("{}", df.tail(Some(head)));
    println!("##################### NA #####################");
    for column in df.get_columns() {
        println!("{:<40} {}", column.name().as_str(), column.null_count());
    }
    println!("##################### Index ####################");
    println!("RangeIndex(start=0, stop={}, step=1)", df.height());
    println!("##################### Quantiles #####################");
    println!("{}", describe(df, quantiles)?);
    Ok(())
}

/// Add total order count and total spend across both channels
pub fn add_totals(df: DataFrame) -> crate::Result<DataFrame> {
    for name in [ONLINE_ORDERS, OFFLINE_ORDERS, ONLINE_VALUE, OFFLINE_VALUE] {
        if df.column(name).is_err() {
            anyhow::bail!("Column '{}' not found in dataset", name);
        }
    }

    let df = df
        .lazy()
        .with_columns([
            (col(ONLINE_ORDERS).cast(DataType::Float64)
                + col(OFFLINE_ORDERS).cast(DataType::Float64))
            .alias(TOTAL_TRANSACTION),
            (col(OFFLINE_VALUE).cast(DataType::Float64)
                + col(ONLINE_VALUE).cast(DataType::Float64))
            .alias(TOTAL_PRICE),
        ])
        .collect()?;

    Ok(df)
}

/// Parse an order timestamp; a bare date is taken as midnight
pub fn parse_order_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
}

/// Whole days in a time difference, rounded towards negative infinity
fn whole_days(delta: TimeDelta) -> i64 {
    delta.num_seconds().div_euclid(86_400)
}

/// Build the per-customer feature table from a frame with totals
///
/// # Arguments
/// * `df` - Customer frame after `add_totals`
/// * `today` - Reference date for tenure
pub fn build_features(df: &DataFrame, today: NaiveDate) -> crate::Result<FeatureTable> {
    let ids = string_column(df, MASTER_ID)?;
    let total_transaction = f64_column(df, TOTAL_TRANSACTION)?;
    let total_price = f64_column(df, TOTAL_PRICE)?;

    // Channel dates are not used by the models but must still be valid dates
    for name in &DATE_COLUMNS[2..] {
        if df.column(name).is_ok() {
            date_column(df, name, true)?;
        }
    }
    let today = today.and_time(NaiveTime::MIN);
    let first_order = date_column(df, FIRST_ORDER_DATE, false)?;
    let last_order = date_column(df, LAST_ORDER_DATE, false)?;

    let mut rows = Vec::with_capacity(df.height());
    for (row, id) in ids.into_iter().enumerate() {
        let (Some(first), Some(last)) = (first_order[row], last_order[row]) else {
            anyhow::bail!("Missing order dates for customer '{}'", id);
        };
        let transactions = total_transaction[row];
        if transactions <= 0.0 {
            anyhow::bail!(
                "Customer '{}' has {} total transactions; average spend is undefined",
                id,
                transactions
            );
        }

        rows.push(CustomerFeatures {
            recency_weeks: whole_days(last - first) as f64 / 7.0,
            tenure_weeks: whole_days(today - first) as f64 / 7.0,
            frequency: (transactions > 1.0).then_some(transactions),
            monetary_avg: total_price[row] / transactions,
            master_id: id,
        });
    }

    let table = FeatureTable { rows };
    let excluded = table.excluded();
    if excluded > 0 {
        warn!(excluded, "Customers with a single order are excluded from model fitting");
    }
    info!(customers = table.len(), "Feature table built");
    Ok(table)
}

fn f64_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| anyhow::anyhow!("Column '{}' not found in dataset", name))?
        .cast(&DataType::Float64)?;

    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| anyhow::anyhow!("Null value in column '{}' at row {}", name, row))
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| anyhow::anyhow!("Column '{}' not found in dataset", name))?
        .cast(&DataType::String)?;

    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("Null value in column '{}' at row {}", name, row))
        })
        .collect()
}

fn date_column(
    df: &DataFrame,
    name: &str,
    allow_null: bool,
) -> crate::Result<Vec<Option<NaiveDateTime>>> {
    let column = df
        .column(name)
        .map_err(|_| anyhow::anyhow!("Column '{}' not found in dataset", name))?
        .cast(&DataType::String)?;

    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(text) => parse_order_date(text).map(Some).ok_or_else(|| {
                anyhow::anyhow!("Invalid date '{}' in column '{}' at row {}", text, name, row)
            }),
            None if allow_null => Ok(None),
            None => Err(anyhow::anyhow!("Null value in column '{}' at row {}", name, row)),
        })
        .collect()
}
