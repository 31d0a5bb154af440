//! CLTVForge: customer lifetime value prediction for retail transactions
//!
//! Cleans transaction data, aggregates it into per-customer recency, age,
//! frequency and monetary features, fits a BG/NBD purchase model and a
//! Gamma-Gamma spend model, and segments customers by predicted value.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod stats;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{CltvConfig, PeriodUnit};
pub use data::{clean_transactions, load_transactions, transactions_to_frame, OutlierThresholds, Transaction};
pub use error::CltvError;
pub use features::{aggregate_features, CustomerFeatures, FeatureTable};
pub use pipeline::{create_cltv_predictions, create_cltv_predictions_with, fit_cltv, PredictionTable};
pub use segment::{segment_by_quartile, Segment};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
