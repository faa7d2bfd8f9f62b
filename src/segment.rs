//! Quantile-based CLTV segmentation into ordinal tiers

use std::fmt;

use polars::prelude::*;
use tracing::info;

use crate::cltv::ScoredCustomer;
use crate::error::{CltvError, CltvResult};

/// Value tier, ordered from lowest (`C`) to highest (`A`) CLTV
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    C,
    B,
    A,
}

impl Segment {
    /// Labels in bin order, lowest bin first
    pub const ASCENDING: [Segment; 3] = [Segment::C, Segment::B, Segment::A];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::C => "C",
            Segment::B => "B",
            Segment::A => "A",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bin `values` at the quantiles given by `cut_points`
///
/// Bin edges are the linearly interpolated quantiles of `values`. Bins are
/// right-closed and the lowest edge is included, so every value lands in
/// exactly one bin.
///
/// # Returns
/// * One segment per value, and the bin edges used
pub fn qcut(values: &[f64], cut_points: &[f64]) -> CltvResult<(Vec<Segment>, Vec<f64>)> {
    if cut_points.len() != Segment::ASCENDING.len() + 1 {
        return Err(CltvError::config(format!(
            "expected {} cut points, got {}",
            Segment::ASCENDING.len() + 1,
            cut_points.len()
        )));
    }
    if values.is_empty() {
        return Err(CltvError::invalid("cannot segment an empty set of values"));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CltvError::invalid("CLTV values must be finite to segment"));
    }

    let ca = Float64Chunked::from_vec("cltv".into(), values.to_vec());
    let edges = cut_points
        .iter()
        .map(|&q| {
            ca.quantile(q, QuantileMethod::Linear)?
                .ok_or_else(|| CltvError::invalid("cannot compute quantiles of empty values"))
        })
        .collect::<CltvResult<Vec<f64>>>()?;

    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CltvError::DuplicateBinEdges(edges));
    }

    let segments = values
        .iter()
        .map(|&v| {
            let bin = edges[1..edges.len() - 1]
                .iter()
                .position(|&edge| v <= edge)
                .unwrap_or(Segment::ASCENDING.len() - 1);
            Segment::ASCENDING[bin]
        })
        .collect();

    Ok((segments, edges))
}

/// Label every scored customer by CLTV quantile
pub fn assign_segments(customers: &mut [ScoredCustomer], cut_points: &[f64]) -> CltvResult<Vec<f64>> {
    let values: Vec<f64> = customers.iter().map(|c| c.cltv).collect();
    let (segments, edges) = qcut(&values, cut_points)?;

    for (customer, segment) in customers.iter_mut().zip(segments) {
        customer.segment = Some(segment);
    }

    info!(edges = ?edges, "Customers segmented");
    Ok(edges)
}
