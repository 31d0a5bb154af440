//! Transaction loading, cleaning and outlier capping using Polars

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::CltvError;
use crate::stats;

pub const INVOICE: &str = "Invoice";
pub const QUANTITY: &str = "Quantity";
pub const PRICE: &str = "Price";
pub const INVOICE_DATE: &str = "InvoiceDate";
pub const CUSTOMER_ID: &str = "Customer ID";

/// Invoice ids containing this marker are cancellations
pub const CANCELLATION_MARKER: char = 'C';

const LOWER_QUANTILE: f64 = 0.01;
const UPPER_QUANTILE: f64 = 0.99;
const RANGE_MULTIPLIER: f64 = 1.5;

/// Accepted `InvoiceDate` layouts, tried in order; spreadsheet exports
/// write month-first `12/1/2010 8:26`
const DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A single invoice line
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub invoice: String,
    pub customer_id: Option<i64>,
    pub quantity: f64,
    pub unit_price: f64,
    pub invoice_date: NaiveDateTime,
}

impl Transaction {
    pub fn new(
        invoice: &str,
        customer_id: Option<i64>,
        quantity: f64,
        unit_price: f64,
        invoice_date: NaiveDateTime,
    ) -> Self {
        Self {
            invoice: invoice.to_string(),
            customer_id,
            quantity,
            unit_price,
            invoice_date,
        }
    }
}

/// Lower and upper capping limits for a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierThresholds {
    pub low_limit: f64,
    pub up_limit: f64,
}

impl OutlierThresholds {
    /// Widen the 1st..99th percentile range by 1.5 times its width on both
    /// sides. Returns `None` for an empty column.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = stats::sorted(values);
        let lower = stats::quantile_sorted(&sorted, LOWER_QUANTILE)?;
        let upper = stats::quantile_sorted(&sorted, UPPER_QUANTILE)?;
        let range = upper - lower;

        Some(Self {
            low_limit: lower - RANGE_MULTIPLIER * range,
            up_limit: upper + RANGE_MULTIPLIER * range,
        })
    }
}

/// Cleaned transactions and the limits their numeric columns were capped at
#[derive(Debug)]
pub struct CleanedTransactions {
    pub frame: DataFrame,
    pub quantity_limits: OutlierThresholds,
    pub price_limits: OutlierThresholds,
}

/// Project the five required columns with the types the pipeline expects.
///
/// Invoice dates end up as `Int64` microseconds since the Unix epoch.
fn required_columns() -> Vec<Expr> {
    vec![
        col(INVOICE).cast(DataType::String),
        col(QUANTITY).cast(DataType::Float64),
        col(PRICE).cast(DataType::Float64),
        col(INVOICE_DATE)
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))
            .cast(DataType::Int64),
        col(CUSTOMER_ID).cast(DataType::Int64),
    ]
}

/// Load a transaction CSV export
///
/// # Arguments
/// * `file_path` - Path to a CSV file with `Invoice`, `Quantity`, `Price`,
///   `InvoiceDate` and `Customer ID` columns (others are ignored)
///
/// # Returns
/// * Raw transaction frame restricted to the required columns
pub fn load_transactions(file_path: &str) -> crate::Result<DataFrame> {
    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()?
        .select([
            col(INVOICE),
            col(QUANTITY),
            col(PRICE),
            col(INVOICE_DATE),
            col(CUSTOMER_ID),
        ])
        .collect()?;
    let df = parse_invoice_dates(df)?
        .lazy()
        .select(required_columns())
        .collect()?;

    info!(rows = df.height(), path = file_path, "loaded transactions");
    Ok(df)
}

/// Parse one `InvoiceDate` text value into microseconds since the epoch
fn parse_invoice_date(raw: &str) -> crate::Result<i64> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|date| date.and_utc().timestamp_micros())
        .ok_or_else(|| CltvError::InvalidDate(raw.to_string()).into())
}

/// Convert a text `InvoiceDate` column into epoch microseconds
fn parse_invoice_dates(mut df: DataFrame) -> crate::Result<DataFrame> {
    let dates = df.column(INVOICE_DATE)?;
    if dates.dtype() != &DataType::String {
        return Ok(df);
    }

    let parsed: Vec<Option<i64>> = dates
        .str()?
        .into_iter()
        .map(|value| value.map(parse_invoice_date).transpose())
        .collect::<crate::Result<_>>()?;

    debug!("parsed invoice dates from text");
    df.with_column(Series::new(INVOICE_DATE, parsed))?;
    Ok(df)
}

/// Build a transaction frame from in-memory records
pub fn transactions_to_frame(transactions: &[Transaction]) -> crate::Result<DataFrame> {
    let invoices: Vec<&str> = transactions.iter().map(|t| t.invoice.as_str()).collect();
    let quantities: Vec<f64> = transactions.iter().map(|t| t.quantity).collect();
    let prices: Vec<f64> = transactions.iter().map(|t| t.unit_price).collect();
    let dates: Vec<i64> = transactions
        .iter()
        .map(|t| t.invoice_date.and_utc().timestamp_micros())
        .collect();
    let customers: Vec<Option<i64>> = transactions.iter().map(|t| t.customer_id).collect();

    let df = df!(
        INVOICE => invoices,
        QUANTITY => quantities,
        PRICE => prices,
        INVOICE_DATE => dates,
        CUSTOMER_ID => customers
    )?;
    Ok(df)
}

/// Remove unusable rows and cap extreme quantities and prices
///
/// Drops rows with any missing required value, cancelled invoices and
/// non-positive quantities or prices, then caps `Quantity` and `Price` at
/// their [`OutlierThresholds`].
pub fn clean_transactions(raw: DataFrame) -> crate::Result<CleanedTransactions> {
    let raw_rows = raw.height();

    let df = raw
        .lazy()
        .select(required_columns())
        .drop_nulls(None)
        .filter(col(QUANTITY).gt(lit(0.0)).and(col(PRICE).gt(lit(0.0))))
        .collect()?;

    let not_cancelled: BooleanChunked = df
        .column(INVOICE)?
        .str()?
        .into_iter()
        .map(|invoice| invoice.map_or(true, |id| !id.contains(CANCELLATION_MARKER)))
        .collect();
    let df = df.filter(&not_cancelled)?;

    if df.height() == 0 {
        return Err(CltvError::NoTransactions.into());
    }

    let (df, quantity_limits) = cap_outliers(df, QUANTITY)?;
    let (df, price_limits) = cap_outliers(df, PRICE)?;

    info!(
        raw_rows,
        clean_rows = df.height(),
        "cleaned transactions"
    );
    debug!(?quantity_limits, ?price_limits, "outlier limits");

    Ok(CleanedTransactions {
        frame: df,
        quantity_limits,
        price_limits,
    })
}

/// Clip a numeric column to its outlier thresholds
pub fn cap_outliers(df: DataFrame, column: &str) -> crate::Result<(DataFrame, OutlierThresholds)> {
    let values: Vec<f64> = df
        .column(column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_no_null_iter()
        .collect();

    let thresholds = OutlierThresholds::from_values(&values)
        .ok_or_else(|| CltvError::EmptyColumn(column.to_string()))?;

    let capped = df
        .lazy()
        .with_column(
            when(col(column).gt(lit(thresholds.up_limit)))
                .then(lit(thresholds.up_limit))
                .when(col(column).lt(lit(thresholds.low_limit)))
                .then(lit(thresholds.low_limit))
                .otherwise(col(column))
                .alias(column),
        )
        .collect()?;

    Ok((capped, thresholds))
}
