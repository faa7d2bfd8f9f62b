//! CLTV scoring: fits both models on repeat customers and derives expected
//! purchases, expected spend and discounted lifetime value per customer

use ndarray::Zip;
use tracing::info;

use crate::config::PipelineConfig;
use crate::data::FeatureTable;
use crate::error::{CltvError, CltvResult};
use crate::model::{BetaGeoFitter, BetaGeoModel, GammaGammaFitter, GammaGammaModel, NelderMead};
use crate::segment::Segment;

/// One scored customer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub master_id: String,
    pub recency_weeks: f64,
    pub tenure_weeks: f64,
    pub frequency: f64,
    pub monetary_avg: f64,
    /// Expected purchases over the forecast horizon
    pub exp_sales: f64,
    /// Expected average spend per purchase
    pub exp_average_value: f64,
    pub cltv: f64,
    /// Assigned by `segment::assign_segments`
    pub segment: Option<Segment>,
}

/// Scores plus the fitted models that produced them
#[derive(Debug, Clone)]
pub struct CltvScores {
    pub customers: Vec<ScoredCustomer>,
    pub purchase_model: BetaGeoModel,
    pub spend_model: GammaGammaModel,
    /// Customers without a frequency, left unscored
    pub excluded: usize,
}

/// Fit BG/NBD and Gamma-Gamma on the feature table and score every repeat
/// customer
pub fn score_customers(features: &FeatureTable, config: &PipelineConfig) -> CltvResult<CltvScores> {
    let calibration = features.calibration();
    if calibration.is_empty() {
        return Err(CltvError::invalid(
            "no customers with more than one order; nothing to fit",
        ));
    }

    let purchase_model = BetaGeoFitter::new(config.bgnbd.penalizer)
        .with_optimizer(NelderMead::new(
            config.bgnbd.max_iterations,
            config.bgnbd.tolerance,
        ))
        .fit(
            &calibration.frequency,
            &calibration.recency,
            &calibration.tenure,
        )?;
    info!(model = %purchase_model, "Purchase frequency model fitted");

    let spend_model = GammaGammaFitter::new(config.gamma_gamma.penalizer)
        .with_optimizer(NelderMead::new(
            config.gamma_gamma.max_iterations,
            config.gamma_gamma.tolerance,
        ))
        .fit(&calibration.frequency, &calibration.monetary)?;
    info!(model = %spend_model, "Monetary value model fitted");

    let forecast = &config.forecast;
    let exp_sales = purchase_model.expected_purchases(forecast.purchase_horizon_weeks, &calibration);
    let exp_average_value = Zip::from(&calibration.frequency)
        .and(&calibration.monetary)
        .map_collect(|&x, &m| spend_model.conditional_expected_average_profit(x, m));
    let cltv = Zip::from(&calibration.frequency)
        .and(&calibration.recency)
        .and(&calibration.tenure)
        .and(&calibration.monetary)
        .map_collect(|&x, &t_x, &tenure, &m| {
            spend_model.customer_lifetime_value(
                &purchase_model,
                x,
                t_x,
                tenure,
                m,
                forecast.cltv_months,
                forecast.frequency,
                forecast.discount_rate,
            )
        });

    let customers: Vec<ScoredCustomer> = calibration
        .customer_ids
        .iter()
        .enumerate()
        .map(|(i, id)| ScoredCustomer {
            master_id: id.clone(),
            recency_weeks: calibration.recency[i],
            tenure_weeks: calibration.tenure[i],
            frequency: calibration.frequency[i],
            monetary_avg: calibration.monetary[i],
            exp_sales: exp_sales[i],
            exp_average_value: exp_average_value[i],
            cltv: cltv[i],
            segment: None,
        })
        .collect();

    info!(
        scored = customers.len(),
        excluded = features.excluded(),
        "Customers scored"
    );

    Ok(CltvScores {
        customers,
        purchase_model,
        spend_model,
        excluded: features.excluded(),
    })
}
