//! Gamma-Gamma model of average transaction value

use statrs::function::gamma::ln_gamma;
use tracing::{debug, info, warn};

use super::optimize::NelderMead;
use super::{MonetaryValueEstimator, MonetaryValueModel};
use crate::error::CltvError;
use crate::features::FeatureTable;

const MODEL_NAME: &str = "Gamma-Gamma";

/// Maximum likelihood Gamma-Gamma fitter with an L2 penalty on the parameters
#[derive(Debug, Clone, Copy)]
pub struct GammaGammaFitter {
    pub penalizer_coef: f64,
}

impl Default for GammaGammaFitter {
    fn default() -> Self {
        Self {
            penalizer_coef: crate::config::DEFAULT_GAMMA_GAMMA_PENALIZER,
        }
    }
}

impl GammaGammaFitter {
    pub fn new(penalizer_coef: f64) -> Self {
        Self { penalizer_coef }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaGammaModel {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

impl GammaGammaModel {
    /// Negative log-likelihood of one customer's average spend
    pub fn negative_log_likelihood(&self, frequency: f64, monetary: f64) -> f64 {
        let GammaGammaModel { p, q, v } = *self;
        let x = frequency;
        let px = p * x;

        -(ln_gamma(px + q) - ln_gamma(px) - ln_gamma(q) + q * v.ln() + (px - 1.0) * monetary.ln()
            + px * x.ln()
            - (px + q) * (x * monetary + v).ln())
    }

    /// Population mean spend per transaction
    pub fn population_mean(&self) -> f64 {
        self.v * self.p / (self.q - 1.0)
    }
}

impl MonetaryValueModel for GammaGammaModel {
    fn expected_average_profit(&self, frequency: f64, monetary: f64) -> f64 {
        let px = self.p * frequency;
        let individual_weight = px / (px + self.q - 1.0);
        let profit = (1.0 - individual_weight) * self.population_mean() + individual_weight * monetary;
        profit.max(0.0)
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("p", self.p), ("q", self.q), ("v", self.v)]
    }
}

impl MonetaryValueEstimator for GammaGammaFitter {
    type Model = GammaGammaModel;

    fn fit(&self, features: &FeatureTable) -> crate::Result<GammaGammaModel> {
        if features.is_empty() {
            return Err(CltvError::InvalidParameter(format!(
                "{} needs at least one customer",
                MODEL_NAME
            ))
            .into());
        }
        if let Some(row) = features
            .rows()
            .find(|row| !(row.frequency > 0.0 && row.monetary_value > 0.0))
        {
            return Err(CltvError::InvalidParameter(format!(
                "{} needs positive frequency and monetary value, customer {} has {} and {}",
                MODEL_NAME, row.customer_id, row.frequency, row.monetary_value
            ))
            .into());
        }

        let n = features.len() as f64;
        let penalizer = self.penalizer_coef;
        let objective = |log_params: &[f64]| {
            let model = GammaGammaModel {
                p: log_params[0].exp(),
                q: log_params[1].exp(),
                v: log_params[2].exp(),
            };
            let total: f64 = features
                .frequency
                .iter()
                .zip(features.monetary.iter())
                .map(|(&x, &m)| model.negative_log_likelihood(x, m))
                .sum();
            total / n + penalizer * (model.p.powi(2) + model.q.powi(2) + model.v.powi(2))
        };

        let minimum = NelderMead::for_dimension(3).minimize(objective, &[0.0; 3]);
        if !minimum.converged {
            return Err(CltvError::ConvergenceFailure {
                model: MODEL_NAME,
                iterations: minimum.iterations,
            }
            .into());
        }
        debug!(iterations = minimum.iterations, objective = minimum.value, "Gamma-Gamma optimiser finished");

        let model = GammaGammaModel {
            p: minimum.point[0].exp(),
            q: minimum.point[1].exp(),
            v: minimum.point[2].exp(),
        };
        if model.q <= 1.0 {
            warn!(q = model.q, "Gamma-Gamma q <= 1, population mean spend is undefined");
        }
        info!(p = model.p, q = model.q, v = model.v, "fitted Gamma-Gamma model");

        Ok(model)
    }
}
