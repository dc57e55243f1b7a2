//! Converts usage counters into money using a [`PricingCatalog`].
//!
//! No rounding happens here; callers format for display (see [`format_usd`]).

use crate::core::{
    domain::{CostBreakdown, PricingCatalog, UsageCounters},
    error::{Error, Result},
};

const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Prices `usage` for `model_id`.
///
/// Fails with [`Error::UnknownModelPricing`] when the catalog has no entry for the
/// model. Free models are in the catalog with zero prices and yield a zero breakdown.
pub fn cost(usage: &UsageCounters, model_id: &str, catalog: &PricingCatalog) -> Result<CostBreakdown> {
    let pricing = catalog
        .get(model_id)
        .ok_or_else(|| Error::UnknownModelPricing {
            model_id: model_id.to_string(),
            suggestion: closest_model(model_id, catalog),
        })?;

    let prompt_cost = pricing.prompt_price_per_token * usage.prompt_tokens as f64;
    let completion_cost = pricing.completion_price_per_token * usage.completion_tokens as f64;
    Ok(CostBreakdown {
        prompt_cost,
        completion_cost,
        total_cost: prompt_cost + completion_cost,
    })
}

/// Catalog id most similar to `model_id`, if any is similar enough to be a likely typo.
pub fn closest_model(model_id: &str, catalog: &PricingCatalog) -> Option<String> {
    catalog
        .iter()
        .map(|model| {
            (
                strsim::jaro_winkler(model_id, &model.model_id),
                &model.model_id,
            )
        })
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id.clone())
}

pub fn format_usd(amount: f64) -> String {
    format!("${amount:.6}")
}
