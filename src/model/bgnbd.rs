//! BG/NBD (beta-geometric / negative binomial) purchase-frequency model

use statrs::function::gamma::ln_gamma;
use tracing::{debug, info};

use super::optimize::NelderMead;
use super::{PurchaseFrequencyEstimator, PurchaseFrequencyModel};
use crate::error::CltvError;
use crate::features::FeatureTable;

const MODEL_NAME: &str = "BG/NBD";

/// Customer ages are rescaled so the oldest customer sits at this value
/// during fitting
const TIME_SCALE_TARGET: f64 = 10.0;

/// Maximum likelihood BG/NBD fitter with an L2 penalty on the parameters
#[derive(Debug, Clone, Copy)]
pub struct BetaGeoFitter {
    pub penalizer_coef: f64,
}

impl Default for BetaGeoFitter {
    fn default() -> Self {
        Self {
            penalizer_coef: crate::config::DEFAULT_BGNBD_PENALIZER,
        }
    }
}

impl BetaGeoFitter {
    pub fn new(penalizer_coef: f64) -> Self {
        Self { penalizer_coef }
    }
}

/// Fitted BG/NBD parameters, time in the units of the training features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaGeoModel {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

impl BetaGeoModel {
    /// Log-likelihood of one customer's history
    pub fn log_likelihood(&self, frequency: f64, recency: f64, age: f64) -> f64 {
        let BetaGeoModel { r, alpha, a, b } = *self;
        let x = frequency;

        let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
        let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
        let a3 = -(r + x) * (alpha + age).ln();

        if x > 0.0 {
            let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + recency).ln();
            a1 + a2 + log_add_exp(a3, a4)
        } else {
            a1 + a2 + a3
        }
    }
}

impl PurchaseFrequencyModel for BetaGeoModel {
    fn expected_purchases(&self, horizon: f64, frequency: f64, recency: f64, age: f64) -> f64 {
        let BetaGeoModel { r, alpha, a, b } = *self;
        let x = frequency;
        let t = horizon;
        if t <= 0.0 {
            return 0.0;
        }

        let z = t / (alpha + age + t);
        let first = (a + b + x - 1.0) / (a - 1.0);
        // ((alpha+T)/(alpha+T+t))^(r+x) * 2F1(r+x, b+x; a+b+x-1; z), rewritten
        // with Euler's transformation so the series stays bounded for large x
        let discounted_hyp = (1.0 - z).powf(a - 1.0)
            * hyp2f1(a + b - 1.0 - r, a - 1.0, a + b + x - 1.0, z);
        let second = 1.0 - discounted_hyp;

        let denominator = if x > 0.0 {
            1.0 + a / (b + x - 1.0) * ((alpha + age) / (alpha + recency)).powf(r + x)
        } else {
            1.0
        };

        (first * second / denominator).max(0.0)
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("r", self.r), ("alpha", self.alpha), ("a", self.a), ("b", self.b)]
    }
}

impl PurchaseFrequencyEstimator for BetaGeoFitter {
    type Model = BetaGeoModel;

    fn fit(&self, features: &FeatureTable) -> crate::Result<BetaGeoModel> {
        if features.is_empty() {
            return Err(CltvError::InvalidParameter(format!(
                "{} needs at least one customer",
                MODEL_NAME
            ))
            .into());
        }

        let max_age = features.age.fold(f64::NEG_INFINITY, |acc, &t| acc.max(t));
        if !(max_age > 0.0) {
            return Err(CltvError::InvalidParameter(format!(
                "{} needs at least one customer with positive age",
                MODEL_NAME
            ))
            .into());
        }
        let scale = TIME_SCALE_TARGET / max_age;

        let frequency = &features.frequency;
        let recency = features.recency.mapv(|v| v * scale);
        let age = features.age.mapv(|v| v * scale);
        let n = features.len() as f64;
        let penalizer = self.penalizer_coef;

        let objective = |log_params: &[f64]| {
            let model = BetaGeoModel {
                r: log_params[0].exp(),
                alpha: log_params[1].exp(),
                a: log_params[2].exp(),
                b: log_params[3].exp(),
            };
            let total: f64 = frequency
                .iter()
                .zip(recency.iter())
                .zip(age.iter())
                .map(|((&x, &tx), &t)| model.log_likelihood(x, tx, t))
                .sum();
            let penalty = penalizer * (model.r.powi(2) + model.alpha.powi(2) + model.a.powi(2) + model.b.powi(2));
            -total / n + penalty
        };

        let optimizer = NelderMead::for_dimension(4);
        let minimum = optimizer.minimize(objective, &[0.0; 4]);
        if !minimum.converged {
            return Err(CltvError::ConvergenceFailure {
                model: MODEL_NAME,
                iterations: minimum.iterations,
            }
            .into());
        }
        debug!(iterations = minimum.iterations, objective = minimum.value, "BG/NBD optimiser finished");

        let params = &minimum.point;
        let model = BetaGeoModel {
            r: params[0].exp(),
            alpha: params[1].exp() / scale,
            a: params[2].exp(),
            b: params[3].exp(),
        };
        info!(r = model.r, alpha = model.alpha, a = model.a, b = model.b, "fitted BG/NBD model");

        Ok(model)
    }
}

/// `ln(e^x + e^y)` without overflow
fn log_add_exp(x: f64, y: f64) -> f64 {
    let max = x.max(y);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + ((x - max).exp() + (y - max).exp()).ln()
}

/// Gauss hypergeometric function `2F1(a, b; c; z)` by its power series,
/// valid for `|z| < 1`
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    const MAX_TERMS: usize = 100_000;
    const TOLERANCE: f64 = 1e-15;

    let mut term = 1.0;
    let mut sum = 1.0;
    for n in 0..MAX_TERMS {
        let k = n as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;
        if term == 0.0 || term.abs() <= TOLERANCE * sum.abs() {
            break;
        }
    }
    sum
}
