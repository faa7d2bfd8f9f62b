//! Command-line interface definitions and argument parsing

use chrono::NaiveDate;
use clap::Parser;

use crate::config::PipelineConfig;

/// Customer lifetime value estimation with BG/NBD and Gamma-Gamma models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "flo_data_20K.csv")]
    pub input: String,

    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<String>,

    /// Reference date for customer tenure (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Horizon for expected purchase counts, in weeks
    #[arg(long)]
    pub horizon_weeks: Option<f64>,

    /// Number of months summed into CLTV
    #[arg(long)]
    pub months: Option<u32>,

    /// Monthly discount rate for future cash flows
    #[arg(long)]
    pub discount_rate: Option<f64>,

    /// Skip the dataset overview printed before the analysis
    #[arg(long)]
    pub skip_inspect: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Load the configuration file (or defaults) and apply flag overrides
    pub fn resolve_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(today) = self.today {
            config.today = today;
        }
        if let Some(weeks) = self.horizon_weeks {
            config.forecast.purchase_horizon_weeks = weeks;
        }
        if let Some(months) = self.months {
            config.forecast.cltv_months = months;
        }
        if let Some(rate) = self.discount_rate {
            config.forecast.discount_rate = rate;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> Args {
        Args {
            input: "test.csv".to_string(),
            config: None,
            today: None,
            horizon_weeks: None,
            months: None,
            discount_rate: None,
            skip_inspect: false,
            verbose: false,
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = args().resolve_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "today: 2021-01-01\nforecast:\n  cltv_months: 12").unwrap();

        let mut args = args();
        args.config = Some(file.path().to_str().unwrap().to_string());
        args.today = NaiveDate::from_ymd_opt(2021, 7, 1);
        args.discount_rate = Some(0.02);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.today, NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
        assert_eq!(config.forecast.cltv_months, 12);
        assert_eq!(config.forecast.discount_rate, 0.02);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut args = args();
        args.months = Some(0);
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::parse_from(["cltvforge", "-i", "data.csv", "--today", "2021-06-01", "-v"]);
        assert_eq!(args.input, "data.csv");
        assert_eq!(args.today, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert!(args.verbose);
    }
}
