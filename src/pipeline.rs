//! End-to-end CLTV pipeline over a loaded customer frame

use polars::prelude::DataFrame;
use tracing::info;

use crate::cltv::{score_customers, CltvScores};
use crate::config::PipelineConfig;
use crate::data::{add_totals, build_features, FeatureTable};
use crate::outlier::{cap_outliers, OutlierThresholds};
use crate::report::{scored_frame, segment_summary};
use crate::segment::assign_segments;

/// Everything produced by a pipeline run
#[derive(Debug)]
pub struct PipelineOutput {
    pub thresholds: Vec<OutlierThresholds>,
    pub features: FeatureTable,
    pub scores: CltvScores,
    /// CLTV quantile edges used for segmentation
    pub segment_edges: Vec<f64>,
    pub scored: DataFrame,
    pub summary: DataFrame,
}

/// Cap outliers, derive features, fit both models, score and segment
///
/// # Arguments
/// * `df` - Raw customer frame as returned by `data::load_dataset`
/// * `config` - Validated pipeline configuration
pub fn run(df: DataFrame, config: &PipelineConfig) -> crate::Result<PipelineOutput> {
    config.validate()?;

    let (df, thresholds) = cap_outliers(df, &config.outliers.columns, &config.outliers.rule())?;
    info!(columns = thresholds.len(), "Outliers capped");

    let df = add_totals(df)?;
    let features = build_features(&df, config.today)?;

    let mut scores = score_customers(&features, config)?;
    let segment_edges = assign_segments(&mut scores.customers, &config.segments.cut_points)?;

    let scored = scored_frame(&scores.customers)?;
    let summary = segment_summary(&scored)?;

    Ok(PipelineOutput {
        thresholds,
        features,
        scores,
        segment_edges,
        scored,
        summary,
    })
}
