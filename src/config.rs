//! Pipeline configuration: reference date, outlier rule, model penalizers,
//! forecast horizon and segment cut points.
//!
//! Every parameter the analysis depends on lives here so that a run is
//! reproducible from a YAML file plus command-line overrides.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CltvError, CltvResult};
use crate::model::ClvFrequency;
use crate::outlier::OutlierRule;

/// Columns whose upper tail is capped before feature derivation
pub const DEFAULT_CAPPED_COLUMNS: [&str; 4] = [
    "order_num_total_ever_online",
    "order_num_total_ever_offline",
    "customer_value_total_ever_offline",
    "customer_value_total_ever_online",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference date used for customer tenure
    pub today: NaiveDate,
    pub outliers: OutlierConfig,
    pub bgnbd: BgNbdConfig,
    pub gamma_gamma: GammaGammaConfig,
    pub forecast: ForecastConfig,
    pub segments: SegmentConfig,
    pub inspect: InspectConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            today: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap_or_default(),
            outliers: OutlierConfig::default(),
            bgnbd: BgNbdConfig::default(),
            gamma_gamma: GammaGammaConfig::default(),
            forecast: ForecastConfig::default(),
            segments: SegmentConfig::default(),
            inspect: InspectConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub columns: Vec<String>,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub iqr_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        let rule = OutlierRule::default();
        Self {
            columns: DEFAULT_CAPPED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            lower_quantile: rule.lower_quantile,
            upper_quantile: rule.upper_quantile,
            iqr_multiplier: rule.iqr_multiplier,
        }
    }
}

impl OutlierConfig {
    pub fn rule(&self) -> OutlierRule {
        OutlierRule {
            lower_quantile: self.lower_quantile,
            upper_quantile: self.upper_quantile,
            iqr_multiplier: self.iqr_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgNbdConfig {
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for BgNbdConfig {
    fn default() -> Self {
        Self {
            penalizer: 0.001,
            max_iterations: 20_000,
            tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GammaGammaConfig {
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for GammaGammaConfig {
    fn default() -> Self {
        Self {
            penalizer: 0.01,
            max_iterations: 20_000,
            tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Horizon for expected purchase counts, in weeks
    pub purchase_horizon_weeks: f64,
    /// Number of periods summed into the CLTV estimate
    pub cltv_months: u32,
    /// Time unit of recency/tenure
    pub frequency: ClvFrequency,
    /// Monthly discount rate applied to future cash flows
    pub discount_rate: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            purchase_horizon_weeks: 4.0 * 6.0,
            cltv_months: 6,
            frequency: ClvFrequency::Weekly,
            discount_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub cut_points: Vec<f64>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            cut_points: vec![0.0, 0.4, 0.8, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Rows shown for head and tail
    pub head: usize,
    pub quantiles: Vec<f64>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            head: 5,
            quantiles: vec![0.05, 0.50, 0.95, 0.99, 1.0],
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file; missing keys take their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> CltvResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CltvError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> CltvResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CltvResult<()> {
        let outliers = &self.outliers;
        for (name, q) in [
            ("outliers.lower_quantile", outliers.lower_quantile),
            ("outliers.upper_quantile", outliers.upper_quantile),
        ] {
            if !(0.0..=1.0).contains(&q) {
                return Err(CltvError::config(format!("{name} must be in [0, 1], got {q}")));
            }
        }
        if outliers.lower_quantile > outliers.upper_quantile {
            return Err(CltvError::config(
                "outliers.lower_quantile must not exceed outliers.upper_quantile",
            ));
        }
        if !(outliers.iqr_multiplier >= 0.0) {
            return Err(CltvError::config("outliers.iqr_multiplier must be non-negative"));
        }

        for (name, penalizer, tolerance, iterations) in [
            (
                "bgnbd",
                self.bgnbd.penalizer,
                self.bgnbd.tolerance,
                self.bgnbd.max_iterations,
            ),
            (
                "gamma_gamma",
                self.gamma_gamma.penalizer,
                self.gamma_gamma.tolerance,
                self.gamma_gamma.max_iterations,
            ),
        ] {
            if !(penalizer >= 0.0) {
                return Err(CltvError::config(format!("{name}.penalizer must be non-negative")));
            }
            if !(tolerance > 0.0) {
                return Err(CltvError::config(format!("{name}.tolerance must be positive")));
            }
            if iterations == 0 {
                return Err(CltvError::config(format!("{name}.max_iterations must be positive")));
            }
        }

        if !(self.forecast.purchase_horizon_weeks > 0.0) {
            return Err(CltvError::config("forecast.purchase_horizon_weeks must be positive"));
        }
        if self.forecast.cltv_months == 0 {
            return Err(CltvError::config("forecast.cltv_months must be at least 1"));
        }
        if !(self.forecast.discount_rate > -1.0) {
            return Err(CltvError::config("forecast.discount_rate must be greater than -1"));
        }

        let cuts = &self.segments.cut_points;
        if cuts.len() != 4 {
            return Err(CltvError::config(format!(
                "segments.cut_points needs 4 entries for segments C, B, A, got {}",
                cuts.len()
            )));
        }
        if cuts.iter().any(|c| !(0.0..=1.0).contains(c)) || cuts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CltvError::config(format!(
                "segments.cut_points must be strictly increasing within [0, 1], got {cuts:?}"
            )));
        }

        if self.inspect.quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
            return Err(CltvError::config("inspect.quantiles must be in [0, 1]"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_analysis_parameters() {
        let config = PipelineConfig::default();
        assert_eq!(config.today, NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(config.bgnbd.penalizer, 0.001);
        assert_eq!(config.gamma_gamma.penalizer, 0.01);
        assert_eq!(config.forecast.purchase_horizon_weeks, 24.0);
        assert_eq!(config.forecast.cltv_months, 6);
        assert_eq!(config.forecast.frequency, ClvFrequency::Weekly);
        assert_eq!(config.segments.cut_points, vec![0.0, 0.4, 0.8, 1.0]);
        assert_eq!(config.outliers.columns.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "today: 2022-01-15\nforecast:\n  discount_rate: 0.02\n  frequency: M\n";
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.today, NaiveDate::from_ymd_opt(2022, 1, 15).unwrap());
        assert_eq!(config.forecast.discount_rate, 0.02);
        assert_eq!(config.forecast.frequency, ClvFrequency::Monthly);
        assert_eq!(config.forecast.cltv_months, 6);
        assert_eq!(config.bgnbd, BgNbdConfig::default());
    }

    #[test]
    fn test_rejects_unordered_cut_points() {
        let yaml = "segments:\n  cut_points: [0.0, 0.8, 0.4, 1.0]\n";
        assert!(matches!(
            PipelineConfig::from_yaml_str(yaml),
            Err(CltvError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_outlier_quantiles() {
        let mut config = PipelineConfig::default();
        config.outliers.lower_quantile = 0.99;
        config.outliers.upper_quantile = 0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = PipelineConfig::from_yaml_file("/nonexistent/cltv.yaml");
        assert!(matches!(result, Err(CltvError::Config(_))));
    }
}
