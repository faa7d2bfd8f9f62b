//! Error types shared by the fitting, segmentation and configuration layers

use thiserror::Error;

pub type CltvResult<T> = std::result::Result<T, CltvError>;

#[derive(Error, Debug)]
pub enum CltvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{model} fit did not converge after {iterations} iterations (objective {objective:.6})")]
    NotConverged {
        model: &'static str,
        iterations: usize,
        objective: f64,
    },

    #[error("Bin edges must be unique: {0:?}")]
    DuplicateBinEdges(Vec<f64>),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CltvError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
