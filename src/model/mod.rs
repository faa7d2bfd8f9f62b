//! Probabilistic CLTV models: BG/NBD for purchase counts and Gamma-Gamma for
//! spend per transaction, fitted by penalized maximum likelihood.

pub mod bgnbd;
pub mod gamma_gamma;
pub mod optimize;
pub mod special;

use serde::{Deserialize, Serialize};

pub use bgnbd::{BetaGeoFitter, BetaGeoModel};
pub use gamma_gamma::{GammaGammaFitter, GammaGammaModel};
pub use optimize::{Minimum, NelderMead};

/// Log parameters beyond this magnitude are treated as infeasible
pub(crate) const LOG_PARAM_BOUND: f64 = 30.0;

/// A model that predicts the cumulative number of purchases a customer makes
/// within `t` time units, given their history
pub trait TransactionModel {
    fn predict(&self, t: f64, frequency: f64, recency: f64, tenure: f64) -> f64;
}

/// Time unit of the recency/tenure inputs, used to convert monthly CLTV
/// periods into model time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClvFrequency {
    #[serde(rename = "W", alias = "weekly")]
    Weekly,
    #[serde(rename = "M", alias = "monthly")]
    Monthly,
    #[serde(rename = "D", alias = "daily")]
    Daily,
    #[serde(rename = "H", alias = "hourly")]
    Hourly,
}

impl ClvFrequency {
    /// Model time units per month
    pub fn periods_per_month(self) -> f64 {
        match self {
            ClvFrequency::Weekly => 4.345,
            ClvFrequency::Monthly => 1.0,
            ClvFrequency::Daily => 30.0,
            ClvFrequency::Hourly => 30.0 * 24.0,
        }
    }
}
