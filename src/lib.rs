//! CLTVForge: customer lifetime value estimation for e-commerce customer data
//!
//! This library caps spend/order outliers, builds recency/tenure/frequency/
//! monetary features, fits BG/NBD and Gamma-Gamma models, scores a discounted
//! CLTV per customer and segments customers into value tiers.

pub mod cli;
pub mod cltv;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod outlier;
pub mod pipeline;
pub mod report;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use cltv::{score_customers, CltvScores, ScoredCustomer};
pub use config::PipelineConfig;
pub use data::{add_totals, build_features, load_dataset, CustomerFeatures, FeatureTable};
pub use error::CltvError;
pub use model::{BetaGeoFitter, BetaGeoModel, GammaGammaFitter, GammaGammaModel, TransactionModel};
pub use outlier::{cap_outliers, OutlierRule, OutlierThresholds};
pub use pipeline::{run, PipelineOutput};
pub use segment::{assign_segments, qcut, Segment};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
