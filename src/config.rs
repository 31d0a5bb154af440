//! Run configuration for the CLTV pipeline

use chrono::{DateTime, TimeZone, Utc};

use crate::error::CltvError;

/// Reference date the customer age (`T`) is measured against
pub const DEFAULT_ANALYSIS_DATE: &str = "2011-12-11T00:00:00Z";

/// Default forecast horizon for the lifetime value, in months
pub const DEFAULT_HORIZON_MONTHS: u32 = 3;

/// Monthly discount rate applied to future cash flows
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.01;

pub const DEFAULT_BGNBD_PENALIZER: f64 = 0.001;
pub const DEFAULT_GAMMA_GAMMA_PENALIZER: f64 = 0.01;

/// Time unit the purchase model was fitted in.
///
/// Determines how many model time units make up one month of the CLV
/// horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PeriodUnit {
    Week,
    Month,
    Day,
    Hour,
}

impl PeriodUnit {
    /// Model time units per month
    pub fn per_month(self) -> f64 {
        match self {
            PeriodUnit::Week => 4.345,
            PeriodUnit::Month => 1.0,
            PeriodUnit::Day => 30.0,
            PeriodUnit::Hour => 30.0 * 24.0,
        }
    }
}

/// Parameters for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct CltvConfig {
    pub analysis_date: DateTime<Utc>,
    pub horizon_months: u32,
    pub discount_rate: f64,
    /// Unit of the fitted model's time axis; features are built in weeks
    pub period_unit: PeriodUnit,
    pub bgnbd_penalizer: f64,
    pub gamma_gamma_penalizer: f64,
}

impl Default for CltvConfig {
    fn default() -> Self {
        Self {
            analysis_date: Utc
                .with_ymd_and_hms(2011, 12, 11, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            horizon_months: DEFAULT_HORIZON_MONTHS,
            discount_rate: DEFAULT_DISCOUNT_RATE,
            period_unit: PeriodUnit::Month,
            bgnbd_penalizer: DEFAULT_BGNBD_PENALIZER,
            gamma_gamma_penalizer: DEFAULT_GAMMA_GAMMA_PENALIZER,
        }
    }
}

impl CltvConfig {
    /// Parse an RFC 3339 analysis date, e.g. `2011-12-11T00:00:00Z`
    pub fn parse_analysis_date(date: &str) -> crate::Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(date)?.with_timezone(&Utc))
    }

    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = months;
        self
    }

    /// Check that every parameter is usable by the models
    pub fn validate(&self) -> crate::Result<()> {
        if self.horizon_months == 0 {
            return Err(CltvError::InvalidParameter(
                "forecast horizon must be at least one month".to_string(),
            )
            .into());
        }
        if !self.discount_rate.is_finite() || self.discount_rate <= -1.0 {
            return Err(CltvError::InvalidParameter(format!(
                "discount rate must be greater than -1, got {}",
                self.discount_rate
            ))
            .into());
        }
        for (name, value) in [
            ("BG/NBD penalizer", self.bgnbd_penalizer),
            ("Gamma-Gamma penalizer", self.gamma_gamma_penalizer),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CltvError::InvalidParameter(format!(
                    "{} must be non-negative, got {}",
                    name, value
                ))
                .into());
            }
        }
        Ok(())
    }
}
