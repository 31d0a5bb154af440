//! Purchase-frequency and monetary-value models behind capability traits
//!
//! The pipeline only talks to [`PurchaseFrequencyEstimator`] and
//! [`MonetaryValueEstimator`]; the default implementations are the BG/NBD
//! ([`BetaGeoFitter`]) and Gamma-Gamma ([`GammaGammaFitter`]) maximum
//! likelihood fits.

pub mod bgnbd;
pub mod clv;
pub mod gamma_gamma;
pub mod optimize;

use ndarray::Array1;

use crate::error::CltvError;
use crate::features::FeatureTable;

pub use bgnbd::{BetaGeoFitter, BetaGeoModel};
pub use clv::customer_lifetime_value;
pub use gamma_gamma::{GammaGammaFitter, GammaGammaModel};

/// Fitted model of how many purchases a customer will make
pub trait PurchaseFrequencyModel {
    /// Expected number of purchases in the next `horizon` time units for a
    /// customer with the given history
    fn expected_purchases(&self, horizon: f64, frequency: f64, recency: f64, age: f64) -> f64;

    /// Named fitted parameters, for reporting
    fn parameters(&self) -> Vec<(&'static str, f64)>;

    /// Expected purchases over `horizon` for every customer in `features`
    fn predict(&self, horizon: f64, features: &FeatureTable) -> crate::Result<Array1<f64>> {
        features
            .rows()
            .map(|row| {
                let expected = self.expected_purchases(
                    horizon,
                    row.frequency,
                    row.recency_weeks,
                    row.age_weeks,
                );
                ensure_finite(expected, "expected purchases", row.customer_id)
            })
            .collect()
    }
}

/// Fits a [`PurchaseFrequencyModel`] on frequency, recency and age
pub trait PurchaseFrequencyEstimator {
    type Model: PurchaseFrequencyModel;

    fn fit(&self, features: &FeatureTable) -> crate::Result<Self::Model>;
}

/// Fitted model of how much a customer spends per transaction
pub trait MonetaryValueModel {
    /// Expected profit per transaction given the observed frequency and
    /// average spend
    fn expected_average_profit(&self, frequency: f64, monetary: f64) -> f64;

    fn parameters(&self) -> Vec<(&'static str, f64)>;

    fn predict_profit(&self, features: &FeatureTable) -> crate::Result<Array1<f64>> {
        features
            .rows()
            .map(|row| {
                let profit = self.expected_average_profit(row.frequency, row.monetary_value);
                ensure_finite(profit, "expected average profit", row.customer_id)
            })
            .collect()
    }
}

/// Fits a [`MonetaryValueModel`] on frequency and average spend
pub trait MonetaryValueEstimator {
    type Model: MonetaryValueModel;

    fn fit(&self, features: &FeatureTable) -> crate::Result<Self::Model>;
}

pub(crate) fn ensure_finite(value: f64, quantity: &'static str, customer_id: i64) -> crate::Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CltvError::NonFiniteEstimate {
            quantity,
            customer_id,
        }
        .into())
    }
}
