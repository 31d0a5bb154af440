//! Integration tests for CLTVForge

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use cltvforge::model::{
    MonetaryValueEstimator, MonetaryValueModel, PurchaseFrequencyEstimator, PurchaseFrequencyModel,
};
use cltvforge::{
    create_cltv_predictions, create_cltv_predictions_with, fit_cltv, load_transactions, CltvConfig,
    CltvError, CustomerFeatures, FeatureTable, PredictionTable, Segment,
};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

/// One invoice line as written to the test CSV
struct Line {
    invoice: String,
    quantity: f64,
    date: NaiveDateTime,
    price: f64,
    customer: Option<i64>,
}

/// 40 repeat customers with 2-7 invoices each, plus a cancellation, a line
/// without customer and a single-purchase big spender
fn generate_lines() -> Vec<Line> {
    let base = NaiveDate::from_ymd_opt(2011, 1, 3)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let mut lines = Vec::new();

    for c in 0..40i64 {
        let customer = Some(12000 + c);
        let invoices = 2 + c % 6;
        let first = base + Duration::days((c * 7) % 200);
        let gap = 4 + (c % 9) * 2;

        for k in 0..invoices {
            let date = first + Duration::days(k * gap);
            let invoice = (500000 + c * 10 + k).to_string();
            lines.push(Line {
                invoice: invoice.clone(),
                quantity: (1 + (c + k) % 4) as f64,
                date,
                price: 1.5 + (c % 7) as f64 * 0.75,
                customer,
            });
            lines.push(Line {
                invoice,
                quantity: 2.0,
                date,
                price: 3.0,
                customer,
            });
        }
    }

    let at = |day: u32| {
        NaiveDate::from_ymd_opt(2011, 6, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    };
    lines.push(Line {
        invoice: "C599999".to_string(),
        quantity: -3.0,
        date: at(1),
        price: 2.0,
        customer: Some(12000),
    });
    lines.push(Line {
        invoice: "599998".to_string(),
        quantity: 5.0,
        date: at(2),
        price: 2.0,
        customer: None,
    });
    lines.push(Line {
        invoice: "599997".to_string(),
        quantity: 1.0,
        date: at(3),
        price: 500.0,
        customer: Some(99999),
    });

    lines
}

/// Create a test CSV file from generated lines
fn create_test_csv(lines: &[Line]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country"
    )
    .unwrap();

    for line in lines {
        let customer = line.customer.map(|c| c.to_string()).unwrap_or_default();
        writeln!(
            file,
            "{},85123A,WHITE HANGING HEART T-LIGHT HOLDER,{},{},{},{},United Kingdom",
            line.invoice,
            line.quantity,
            line.date.format("%Y-%m-%d %H:%M:%S"),
            line.price,
            customer
        )
        .unwrap();
    }

    file
}

fn run_default_pipeline(config: &CltvConfig) -> PredictionTable {
    let test_file = create_test_csv(&generate_lines());
    let raw = load_transactions(test_file.path().to_str().unwrap()).unwrap();
    create_cltv_predictions(raw, config).unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let table = run_default_pipeline(&CltvConfig::default());

    // 40 repeat customers, the single-purchase customer is dropped
    assert_eq!(table.len(), 40);
    assert!(table.rows.iter().all(|row| row.features.customer_id != 99999));

    for row in &table.rows {
        assert!(row.features.frequency > 1.0);
        assert!(row.features.recency_weeks >= 0.0);
        assert!(row.features.recency_weeks <= row.features.age_weeks);
        assert!(row.expected_purchases_1_week >= 0.0);
        assert!(row.expected_purchases_1_month >= row.expected_purchases_1_week);
        assert!(row.expected_purchases_3_months >= row.expected_purchases_1_month);
        assert!(row.expected_average_profit > 0.0);
        assert!(row.clv.is_finite() && row.clv >= 0.0);
    }
}

#[test]
fn test_monetary_matches_raw_transactions() {
    let lines = generate_lines();
    let table = run_default_pipeline(&CltvConfig::default());

    let mut spend: HashMap<i64, (f64, Vec<String>)> = HashMap::new();
    for line in lines.iter().filter(|l| !l.invoice.contains('C')) {
        if let Some(customer) = line.customer {
            let entry = spend.entry(customer).or_default();
            entry.0 += line.quantity * line.price;
            if !entry.1.contains(&line.invoice) {
                entry.1.push(line.invoice.clone());
            }
        }
    }

    for row in &table.rows {
        let (total, invoices) = &spend[&row.features.customer_id];
        assert_eq!(row.features.frequency, invoices.len() as f64);
        assert_relative_eq!(
            row.features.monetary_value,
            total / invoices.len() as f64,
            epsilon = 1e-9
        );
    }
}

#[test]
fn test_segments_are_quartiles() {
    let table = run_default_pipeline(&CltvConfig::default());

    let mut means = Vec::new();
    for segment in Segment::ALL {
        let values: Vec<f64> = table
            .rows
            .iter()
            .filter(|row| row.segment == segment)
            .map(|row| row.clv)
            .collect();
        assert_eq!(values.len(), 10, "segment {} is not a quartile", segment);
        means.push(values.iter().sum::<f64>() / values.len() as f64);
    }
    assert!(means.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_longer_horizon_increases_value() {
    let short = run_default_pipeline(&CltvConfig::default());
    let long = run_default_pipeline(&CltvConfig::default().with_horizon_months(6));

    for (a, b) in short.rows.iter().zip(&long.rows) {
        assert_eq!(a.features, b.features);
        assert!(b.clv > a.clv);
    }
}

#[test]
fn test_output_frame_columns() {
    let table = run_default_pipeline(&CltvConfig::default());
    let df = table.to_dataframe().unwrap();

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "Customer ID",
            "recency",
            "T",
            "frequency",
            "monetary",
            "expected_purc_1_week",
            "expected_purc_1_month",
            "expected_purc_3_months",
            "expected_average_profit",
            "clv",
            "segment",
        ]
    );
    assert_eq!(df.height(), 40);
}

#[test]
fn test_score_new_customer() {
    let test_file = create_test_csv(&generate_lines());
    let raw = load_transactions(test_file.path().to_str().unwrap()).unwrap();
    let fitted = fit_cltv(raw, &CltvConfig::default()).unwrap();

    let score = fitted
        .score(CustomerFeatures {
            customer_id: 0,
            recency_weeks: 45.0,
            age_weeks: 46.0,
            frequency: 6.0,
            monetary_value: 30.0,
        })
        .unwrap();

    assert!(score.expected_purchases_1_week >= 0.0);
    assert!(score.expected_purchases_3_months >= score.expected_purchases_1_week);
    assert!(score.expected_average_profit > 0.0);
    assert!(score.clv >= 0.0);
    assert!(Segment::ALL.contains(&score.segment));
}

#[test]
fn test_single_purchase_customers_only_fails() {
    let lines: Vec<Line> = generate_lines()
        .into_iter()
        .filter(|line| line.invoice.ends_with('0') || line.customer == Some(99999))
        .collect();
    let test_file = create_test_csv(&lines);
    let raw = load_transactions(test_file.path().to_str().unwrap()).unwrap();

    let err = create_cltv_predictions(raw, &CltvConfig::default()).unwrap_err();
    assert_eq!(err.downcast_ref::<CltvError>(), Some(&CltvError::NoRepeatCustomers));
}

/// Purchases accrue at the customer's historical weekly rate
#[derive(Debug)]
struct HistoricalRate;

#[derive(Debug)]
struct HistoricalRateModel;

impl PurchaseFrequencyModel for HistoricalRateModel {
    fn expected_purchases(&self, horizon: f64, frequency: f64, _recency: f64, age: f64) -> f64 {
        horizon * frequency / age.max(1.0)
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }
}

impl PurchaseFrequencyEstimator for HistoricalRate {
    type Model = HistoricalRateModel;

    fn fit(&self, _features: &FeatureTable) -> cltvforge::Result<HistoricalRateModel> {
        Ok(HistoricalRateModel)
    }
}

/// Expected profit is the observed average spend
#[derive(Debug)]
struct ObservedSpend;

impl MonetaryValueModel for ObservedSpend {
    fn expected_average_profit(&self, _frequency: f64, monetary: f64) -> f64 {
        monetary
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }
}

impl MonetaryValueEstimator for ObservedSpend {
    type Model = ObservedSpend;

    fn fit(&self, _features: &FeatureTable) -> cltvforge::Result<ObservedSpend> {
        Ok(ObservedSpend)
    }
}

#[test]
fn test_substitute_estimators() {
    let test_file = create_test_csv(&generate_lines());
    let raw = load_transactions(test_file.path().to_str().unwrap()).unwrap();

    let fitted =
        create_cltv_predictions_with(raw, &CltvConfig::default(), &HistoricalRate, &ObservedSpend)
            .unwrap();

    assert_eq!(fitted.table.len(), 40);
    for row in &fitted.table.rows {
        assert_eq!(row.expected_average_profit, row.features.monetary_value);
        assert_relative_eq!(
            row.expected_purchases_1_month,
            4.0 * row.features.frequency / row.features.age_weeks.max(1.0),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_too_few_customers_to_segment_fails() {
    let lines: Vec<Line> = generate_lines()
        .into_iter()
        .filter(|line| matches!(line.customer, Some(12001) | Some(12002) | Some(12003)))
        .collect();
    let test_file = create_test_csv(&lines);
    let raw = load_transactions(test_file.path().to_str().unwrap()).unwrap();

    let err =
        create_cltv_predictions_with(raw, &CltvConfig::default(), &HistoricalRate, &ObservedSpend)
            .unwrap_err();
    assert_eq!(
        err.downcast_ref::<CltvError>(),
        Some(&CltvError::InsufficientDistinctValues { distinct: 3, bins: 4 })
    );
}
