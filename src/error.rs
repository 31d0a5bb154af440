//! Domain error types raised by the CLTV pipeline
//!
//! Functions in this crate return `crate::Result<T>` (an `anyhow::Result`);
//! failures that callers may want to match on are raised as [`CltvError`]
//! and can be recovered with `err.downcast_ref::<CltvError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CltvError {
    /// No rows left after cleaning the transaction table
    #[error("No valid transactions found after cleaning")]
    NoTransactions,

    /// A numeric column had no values to compute thresholds from
    #[error("Column '{0}' has no values")]
    EmptyColumn(String),

    /// Every customer made a single purchase
    #[error("No customers with more than one purchase")]
    NoRepeatCustomers,

    /// Quantile binning needs at least one distinct value per bin
    #[error("Cannot form {bins} quantile bins from {distinct} distinct values")]
    InsufficientDistinctValues { distinct: usize, bins: usize },

    /// Two quantile edges coincide, which would leave a bin empty
    #[error("Quantile bin edges must be unique: {edges:?}")]
    DuplicateBinEdges { edges: Vec<f64> },

    /// The likelihood optimiser hit its iteration limit
    #[error("{model} fit did not converge after {iterations} iterations")]
    ConvergenceFailure { model: &'static str, iterations: usize },

    /// A model produced NaN or infinity
    #[error("Non-finite {quantity} for customer {customer_id}")]
    NonFiniteEstimate {
        quantity: &'static str,
        customer_id: i64,
    },

    /// An `InvoiceDate` value matched none of the accepted layouts
    #[error("Unrecognised invoice date '{0}'")]
    InvalidDate(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
