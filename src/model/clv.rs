//! Discounted customer lifetime value from a purchase model and expected profit

use ndarray::Array1;

use super::{ensure_finite, PurchaseFrequencyModel};
use crate::config::PeriodUnit;
use crate::error::CltvError;
use crate::features::FeatureTable;

/// Discounted lifetime value over `horizon_months` for every customer
///
/// For each month `i` the purchases expected between `(i-1)·f` and `i·f`
/// model time units (`f` = units per month of `period_unit`) are valued at
/// the customer's expected profit and discounted by `(1 + discount_rate)^i`.
///
/// # Arguments
/// * `model` - Fitted purchase-frequency model
/// * `features` - Customer features the model is evaluated on
/// * `expected_profit` - Expected profit per transaction, aligned with `features`
/// * `horizon_months` - Number of months to sum over
/// * `period_unit` - Time unit of the model
/// * `discount_rate` - Monthly discount rate
pub fn customer_lifetime_value<M: PurchaseFrequencyModel + ?Sized>(
    model: &M,
    features: &FeatureTable,
    expected_profit: &Array1<f64>,
    horizon_months: u32,
    period_unit: PeriodUnit,
    discount_rate: f64,
) -> crate::Result<Array1<f64>> {
    if expected_profit.len() != features.len() {
        return Err(CltvError::InvalidParameter(format!(
            "expected {} profit values, got {}",
            features.len(),
            expected_profit.len()
        ))
        .into());
    }

    let factor = period_unit.per_month();

    features
        .rows()
        .zip(expected_profit.iter())
        .map(|(row, &profit)| {
            let expected_at = |time: f64| {
                model.expected_purchases(time, row.frequency, row.recency_weeks, row.age_weeks)
            };

            let clv: f64 = (1..=horizon_months)
                .map(|month| {
                    let end = month as f64 * factor;
                    let purchases = expected_at(end) - expected_at(end - factor);
                    profit * purchases / (1.0 + discount_rate).powi(month as i32)
                })
                .sum();

            ensure_finite(clv, "lifetime value", row.customer_id)
        })
        .collect()
}
