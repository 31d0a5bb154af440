//! Per-customer recency / age / frequency / monetary features

use chrono::{DateTime, Utc};
use ndarray::Array1;
use polars::prelude::*;
use tracing::info;

use crate::data::{CUSTOMER_ID, INVOICE, INVOICE_DATE, PRICE, QUANTITY};
use crate::error::CltvError;

const MICROS_PER_DAY: i64 = 86_400_000_000;
const DAYS_PER_WEEK: f64 = 7.0;

/// Features of one repeat customer, time in weeks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerFeatures {
    pub customer_id: i64,
    /// Weeks between first and last purchase
    pub recency_weeks: f64,
    /// Weeks between first purchase and the analysis date (`T`)
    pub age_weeks: f64,
    /// Number of distinct invoices
    pub frequency: f64,
    /// Average spend per invoice
    pub monetary_value: f64,
}

/// Column-oriented feature table, one entry per qualifying customer
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub customer_ids: Vec<i64>,
    pub recency: Array1<f64>,
    pub age: Array1<f64>,
    pub frequency: Array1<f64>,
    pub monetary: Array1<f64>,
}

impl FeatureTable {
    pub fn from_rows(rows: &[CustomerFeatures]) -> Self {
        Self {
            customer_ids: rows.iter().map(|r| r.customer_id).collect(),
            recency: rows.iter().map(|r| r.recency_weeks).collect(),
            age: rows.iter().map(|r| r.age_weeks).collect(),
            frequency: rows.iter().map(|r| r.frequency).collect(),
            monetary: rows.iter().map(|r| r.monetary_value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }

    pub fn row(&self, index: usize) -> CustomerFeatures {
        CustomerFeatures {
            customer_id: self.customer_ids[index],
            recency_weeks: self.recency[index],
            age_weeks: self.age[index],
            frequency: self.frequency[index],
            monetary_value: self.monetary[index],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = CustomerFeatures> + '_ {
        (0..self.len()).map(|i| self.row(i))
    }
}

/// Whole days between two microsecond timestamps, rounded toward the past
fn whole_days(later: i64, earlier: i64) -> f64 {
    (later - earlier).div_euclid(MICROS_PER_DAY) as f64
}

/// Aggregate cleaned transactions into per-customer features
///
/// # Arguments
/// * `df` - Cleaned transactions (see [`crate::data::clean_transactions`])
/// * `analysis_date` - Reference date for the customer age
///
/// # Returns
/// * Features of every customer with more than one distinct invoice, in
///   order of first appearance
pub fn aggregate_features(df: &DataFrame, analysis_date: DateTime<Utc>) -> crate::Result<FeatureTable> {
    let reference = analysis_date.timestamp_micros();

    let summary = df
        .clone()
        .lazy()
        .with_column((col(QUANTITY) * col(PRICE)).alias("TotalPrice"))
        .group_by_stable([col(CUSTOMER_ID)])
        .agg([
            col(INVOICE_DATE).min().alias("FirstPurchase"),
            col(INVOICE_DATE).max().alias("LastPurchase"),
            col(INVOICE).n_unique().alias("Frequency"),
            col("TotalPrice").sum().alias("TotalSpend"),
        ])
        .collect()?;

    let customer_ids: Vec<i64> = summary.column(CUSTOMER_ID)?.i64()?.into_no_null_iter().collect();
    let first: Vec<i64> = summary.column("FirstPurchase")?.i64()?.into_no_null_iter().collect();
    let last: Vec<i64> = summary.column("LastPurchase")?.i64()?.into_no_null_iter().collect();
    let frequency: Vec<f64> = summary
        .column("Frequency")?
        .cast(&DataType::Float64)?
        .f64()?
        .into_no_null_iter()
        .collect();
    let total_spend: Vec<f64> = summary.column("TotalSpend")?.f64()?.into_no_null_iter().collect();

    let rows: Vec<CustomerFeatures> = (0..customer_ids.len())
        .filter(|&i| frequency[i] > 1.0)
        .map(|i| CustomerFeatures {
            customer_id: customer_ids[i],
            recency_weeks: whole_days(last[i], first[i]) / DAYS_PER_WEEK,
            age_weeks: whole_days(reference, first[i]) / DAYS_PER_WEEK,
            frequency: frequency[i],
            monetary_value: total_spend[i] / frequency[i],
        })
        .collect();

    if rows.is_empty() {
        return Err(CltvError::NoRepeatCustomers.into());
    }

    info!(
        customers = customer_ids.len(),
        repeat_customers = rows.len(),
        "aggregated customer features"
    );

    Ok(FeatureTable::from_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{transactions_to_frame, Transaction};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn analysis_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 12, 11, 0, 0, 0).unwrap()
    }

    fn sample_frame() -> DataFrame {
        transactions_to_frame(&[
            // customer 1: three invoices, four lines
            Transaction::new("1", Some(1), 2.0, 10.0, at(1, 1, 9)),
            Transaction::new("2", Some(1), 1.0, 5.0, at(1, 15, 9)),
            Transaction::new("3", Some(1), 3.0, 4.0, at(1, 29, 9)),
            // customer 2: single invoice with two lines
            Transaction::new("4", Some(2), 100.0, 50.0, at(3, 1, 9)),
            Transaction::new("4", Some(2), 10.0, 5.0, at(3, 1, 9)),
            // customer 3: two invoices
            Transaction::new("5", Some(3), 1.0, 8.0, at(11, 1, 12)),
            Transaction::new("6", Some(3), 2.0, 6.0, at(11, 8, 11)),
            Transaction::new("6", Some(3), 1.0, 4.0, at(11, 8, 11)),
        ])
        .unwrap()
    }

    #[test]
    fn test_features_of_repeat_customer() {
        let table = aggregate_features(&sample_frame(), analysis_date()).unwrap();
        let first = table.row(0);

        assert_eq!(first.customer_id, 1);
        assert_eq!(first.frequency, 3.0);
        assert_relative_eq!(first.monetary_value, 37.0 / 3.0);
        assert_relative_eq!(first.recency_weeks, 4.0);
        // 2011-01-01 09:00 to 2011-12-11 00:00 is 343 whole days
        assert_relative_eq!(first.age_weeks, 343.0 / 7.0);
    }

    #[test]
    fn test_single_purchase_customer_excluded() {
        let table = aggregate_features(&sample_frame(), analysis_date()).unwrap();
        assert_eq!(table.customer_ids, vec![1, 3]);
        assert!(table.frequency.iter().all(|&f| f > 1.0));
    }

    #[test]
    fn test_partial_days_are_floored() {
        let table = aggregate_features(&sample_frame(), analysis_date()).unwrap();
        let third = table.row(1);

        // 6 days and 23 hours between purchases
        assert_relative_eq!(third.recency_weeks, 6.0 / 7.0);
        assert_relative_eq!(third.monetary_value, (8.0 + 12.0 + 4.0) / 2.0);
    }

    #[test]
    fn test_recency_never_exceeds_age() {
        let table = aggregate_features(&sample_frame(), analysis_date()).unwrap();
        for row in table.rows() {
            assert!(row.recency_weeks >= 0.0);
            assert!(row.recency_weeks <= row.age_weeks);
        }
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let df = sample_frame();
        let first = aggregate_features(&df, analysis_date()).unwrap();
        let second = aggregate_features(&df, analysis_date()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_repeat_customers_fails() {
        let df = transactions_to_frame(&[
            Transaction::new("1", Some(1), 1.0, 1.0, at(1, 1, 9)),
            Transaction::new("2", Some(2), 1.0, 1.0, at(1, 2, 9)),
        ])
        .unwrap();

        let err = aggregate_features(&df, analysis_date()).unwrap_err();
        assert_eq!(err.downcast_ref::<CltvError>(), Some(&CltvError::NoRepeatCustomers));
    }
}
