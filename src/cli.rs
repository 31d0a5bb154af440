//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::config::{
    CltvConfig, PeriodUnit, DEFAULT_ANALYSIS_DATE, DEFAULT_BGNBD_PENALIZER, DEFAULT_DISCOUNT_RATE,
    DEFAULT_GAMMA_GAMMA_PENALIZER,
};
use crate::features::CustomerFeatures;

/// Customer lifetime value prediction with BG/NBD and Gamma-Gamma models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "online_retail_II.csv")]
    pub input: String,

    /// Forecast horizon for the lifetime value, in months
    #[arg(short, long, default_value = "3")]
    pub months: u32,

    /// Reference date for customer age (RFC 3339)
    #[arg(long, default_value = DEFAULT_ANALYSIS_DATE)]
    pub analysis_date: String,

    /// Monthly discount rate
    #[arg(long, default_value_t = DEFAULT_DISCOUNT_RATE)]
    pub discount_rate: f64,

    /// Time unit of the purchase model when converting months
    #[arg(long, value_enum, default_value = "month")]
    pub period_unit: PeriodUnit,

    /// L2 penalizer of the BG/NBD fit
    #[arg(long, default_value_t = DEFAULT_BGNBD_PENALIZER)]
    pub bgnbd_penalizer: f64,

    /// L2 penalizer of the Gamma-Gamma fit
    #[arg(long, default_value_t = DEFAULT_GAMMA_GAMMA_PENALIZER)]
    pub gamma_gamma_penalizer: f64,

    /// Write the prediction table to this CSV file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Number of customers listed in the top-N reports
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Prediction mode: score a customer given as comma-separated values
    /// Example: --predict "5,20.5,30,150.0" for Frequency=5, Recency=20.5 weeks,
    /// T=30 weeks, Monetary=150.0
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration from the parsed flags
    pub fn to_config(&self) -> crate::Result<CltvConfig> {
        let config = CltvConfig {
            analysis_date: CltvConfig::parse_analysis_date(&self.analysis_date)?,
            horizon_months: self.months,
            discount_rate: self.discount_rate,
            period_unit: self.period_unit,
            bgnbd_penalizer: self.bgnbd_penalizer,
            gamma_gamma_penalizer: self.gamma_gamma_penalizer,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse customer features from the predict string
    /// Expected format: "frequency,recency,T,monetary"
    pub fn parse_customer_features(&self) -> crate::Result<Option<CustomerFeatures>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != 4 {
            anyhow::bail!("Predict values must be in format 'frequency,recency,T,monetary'");
        }

        let parse = |name: &str, raw: &str| -> crate::Result<f64> {
            raw.trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid {} value: {}", name, raw))
        };

        let frequency = parse("frequency", parts[0])?;
        let recency_weeks = parse("recency", parts[1])?;
        let age_weeks = parse("T", parts[2])?;
        let monetary_value = parse("monetary", parts[3])?;

        if recency_weeks > age_weeks {
            anyhow::bail!("Recency ({}) cannot exceed T ({})", recency_weeks, age_weeks);
        }

        Ok(Some(CustomerFeatures {
            customer_id: 0,
            recency_weeks,
            age_weeks,
            frequency,
            monetary_value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_args() -> Args {
        Args::parse_from(["cltvforge", "--input", "test.csv"])
    }

    #[test]
    fn test_defaults_build_reference_config() {
        let args = create_args();
        assert_eq!(args.months, 3);
        assert_eq!(args.period_unit, PeriodUnit::Month);
        assert_eq!(args.to_config().unwrap(), CltvConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "cltvforge",
            "--months",
            "6",
            "--period-unit",
            "week",
            "--discount-rate",
            "0.02",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.horizon_months, 6);
        assert_eq!(config.period_unit, PeriodUnit::Week);
        assert_eq!(config.discount_rate, 0.02);
    }

    #[test]
    fn test_invalid_analysis_date() {
        let mut args = create_args();
        args.analysis_date = "11/12/2011".to_string();
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_parse_customer_features() {
        let mut args = create_args();
        args.predict = Some("5, 20.5, 30, 150.0".to_string());

        let features = args.parse_customer_features().unwrap().unwrap();
        assert_eq!(features.frequency, 5.0);
        assert_eq!(features.recency_weeks, 20.5);
        assert_eq!(features.age_weeks, 30.0);
        assert_eq!(features.monetary_value, 150.0);

        args.predict = None;
        assert_eq!(args.parse_customer_features().unwrap(), None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_customer_features().is_err());

        args.predict = Some("5,40,30,150".to_string());
        assert!(args.parse_customer_features().is_err());
    }
}
