//! Quantile-based outlier capping for numeric columns

use polars::prelude::*;
use tracing::debug;

/// Quantile/IQR rule used to derive outlier limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRule {
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub iqr_multiplier: f64,
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self {
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            iqr_multiplier: 1.5,
        }
    }
}

/// Limits computed for a single column
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierThresholds {
    pub column: String,
    pub low: f64,
    pub up: f64,
    /// Value written over the upper tail: `up` rounded half to even
    pub cap: f64,
    /// Number of values that were pulled down to `cap`
    pub capped: usize,
}

impl OutlierRule {
    /// Compute (low, up) limits for a numeric column
    ///
    /// Quantiles use linear interpolation between order statistics.
    pub fn thresholds(&self, values: &Float64Chunked) -> crate::Result<(f64, f64)> {
        let q1 = values
            .quantile(self.lower_quantile, QuantileMethod::Linear)?
            .ok_or_else(|| anyhow::anyhow!("Cannot compute quantiles of an empty column"))?;
        let q3 = values
            .quantile(self.upper_quantile, QuantileMethod::Linear)?
            .ok_or_else(|| anyhow::anyhow!("Cannot compute quantiles of an empty column"))?;

        let iqr = q3 - q1;
        let up = q3 + self.iqr_multiplier * iqr;
        let low = q1 - self.iqr_multiplier * iqr;
        Ok((low, up))
    }
}

/// Cap the upper tail of each column at its rounded upper limit
///
/// Values above `up` are replaced by `up` rounded half to even, so a limit of
/// 2.5 caps at 2. Columns are cast to `Float64` first. The lower limit is reported in the
/// returned thresholds but not applied.
///
/// # Returns
/// * The capped frame and the thresholds used for every column, in order
pub fn cap_outliers(
    df: DataFrame,
    columns: &[String],
    rule: &OutlierRule,
) -> crate::Result<(DataFrame, Vec<OutlierThresholds>)> {
    let mut df = df;
    let mut thresholds = Vec::with_capacity(columns.len());

    for name in columns {
        let column = df
            .column(name)
            .map_err(|_| anyhow::anyhow!("Column '{}' not found in dataset", name))?;
        if !is_numeric(column.dtype()) {
            anyhow::bail!(
                "Column '{}' must be numeric to cap outliers, found {}",
                name,
                column.dtype()
            );
        }
        let values = column.cast(&DataType::Float64)?;
        let values = values.f64()?;
        if values.len() == values.null_count() {
            anyhow::bail!("Column '{}' has no values to compute outlier limits", name);
        }

        let (low, up) = rule.thresholds(values)?;
        let cap = up.round_ties_even();
        let capped = values.into_iter().flatten().filter(|&v| v > up).count();
        debug!(column = %name, low, up, cap, capped, "Outlier limits computed");

        df = df
            .lazy()
            .with_column(
                when(col(name.as_str()).cast(DataType::Float64).gt(lit(up)))
                    .then(lit(cap))
                    .otherwise(col(name.as_str()).cast(DataType::Float64))
                    .alias(name.as_str()),
            )
            .collect()?;

        thresholds.push(OutlierThresholds {
            column: name.clone(),
            low,
            up,
            cap,
            capped,
        });
    }

    Ok((df, thresholds))
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}
