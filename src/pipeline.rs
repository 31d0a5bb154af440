//! End-to-end CLTV pipeline: clean, aggregate, fit, predict, segment

use polars::prelude::*;
use tracing::info;

use crate::config::CltvConfig;
use crate::data::{clean_transactions, OutlierThresholds, CUSTOMER_ID};
use crate::features::{aggregate_features, CustomerFeatures, FeatureTable};
use crate::model::{
    customer_lifetime_value, BetaGeoFitter, BetaGeoModel, GammaGammaFitter, GammaGammaModel,
    MonetaryValueEstimator, MonetaryValueModel, PurchaseFrequencyEstimator, PurchaseFrequencyModel,
};
use crate::segment::{segment_by_quartile, Segment, SegmentEdges};

/// Prediction horizons in weeks: one week, one month and three months
pub const ONE_WEEK: f64 = 1.0;
pub const ONE_MONTH: f64 = 4.0;
pub const THREE_MONTHS: f64 = 12.0;

/// Features and predictions of one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerPrediction {
    pub features: CustomerFeatures,
    pub expected_purchases_1_week: f64,
    pub expected_purchases_1_month: f64,
    pub expected_purchases_3_months: f64,
    pub expected_average_profit: f64,
    pub clv: f64,
    pub segment: Segment,
}

/// Result of one pipeline run, one row per repeat customer
#[derive(Debug, Clone)]
pub struct PredictionTable {
    pub rows: Vec<CustomerPrediction>,
    pub segment_edges: SegmentEdges,
    pub quantity_limits: OutlierThresholds,
    pub price_limits: OutlierThresholds,
}

impl PredictionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted by a key, highest first
    pub fn top_by<F>(&self, n: usize, key: F) -> Vec<&CustomerPrediction>
    where
        F: Fn(&CustomerPrediction) -> f64,
    {
        let mut rows: Vec<&CustomerPrediction> = self.rows.iter().collect();
        rows.sort_by(|a, b| key(b).total_cmp(&key(a)));
        rows.truncate(n);
        rows
    }

    /// Convert to a Polars frame with the output column names
    pub fn to_dataframe(&self) -> crate::Result<DataFrame> {
        let column = |f: fn(&CustomerPrediction) -> f64| -> Vec<f64> { self.rows.iter().map(f).collect() };

        let customer_ids: Vec<i64> = self.rows.iter().map(|r| r.features.customer_id).collect();
        let segments: Vec<&str> = self.rows.iter().map(|r| r.segment.label()).collect();

        let df = df!(
            CUSTOMER_ID => customer_ids,
            "recency" => column(|r| r.features.recency_weeks),
            "T" => column(|r| r.features.age_weeks),
            "frequency" => column(|r| r.features.frequency),
            "monetary" => column(|r| r.features.monetary_value),
            "expected_purc_1_week" => column(|r| r.expected_purchases_1_week),
            "expected_purc_1_month" => column(|r| r.expected_purchases_1_month),
            "expected_purc_3_months" => column(|r| r.expected_purchases_3_months),
            "expected_average_profit" => column(|r| r.expected_average_profit),
            "clv" => column(|r| r.clv),
            "segment" => segments
        )?;
        Ok(df)
    }
}

/// Predictions for a single customer history
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerScore {
    pub expected_purchases_1_week: f64,
    pub expected_purchases_1_month: f64,
    pub expected_purchases_3_months: f64,
    pub expected_average_profit: f64,
    pub clv: f64,
    pub segment: Segment,
}

/// Fitted models together with the table they produced
#[derive(Debug, Clone)]
pub struct FittedCltv<P, M> {
    pub purchase_model: P,
    pub monetary_model: M,
    pub table: PredictionTable,
    pub config: CltvConfig,
}

impl<P, M> FittedCltv<P, M>
where
    P: PurchaseFrequencyModel,
    M: MonetaryValueModel,
{
    /// Score a customer that was not part of the training data
    ///
    /// # Arguments
    /// * `features` - Frequency, recency (weeks), age (weeks) and average spend
    pub fn score(&self, features: CustomerFeatures) -> crate::Result<CustomerScore> {
        let table = FeatureTable::from_rows(&[features]);
        let predict = |horizon: f64| -> crate::Result<f64> {
            Ok(self.purchase_model.predict(horizon, &table)?[0])
        };

        let profit = self.monetary_model.predict_profit(&table)?;
        let clv = customer_lifetime_value(
            &self.purchase_model,
            &table,
            &profit,
            self.config.horizon_months,
            self.config.period_unit,
            self.config.discount_rate,
        )?[0];

        Ok(CustomerScore {
            expected_purchases_1_week: predict(ONE_WEEK)?,
            expected_purchases_1_month: predict(ONE_MONTH)?,
            expected_purchases_3_months: predict(THREE_MONTHS)?,
            expected_average_profit: profit[0],
            clv,
            segment: self.table.segment_edges.classify(clv),
        })
    }
}

/// Run the pipeline with the default BG/NBD and Gamma-Gamma estimators
///
/// # Arguments
/// * `raw` - Raw transaction frame (see [`crate::data::load_transactions`])
/// * `config` - Run parameters
///
/// # Returns
/// * One prediction row per customer with more than one purchase
pub fn create_cltv_predictions(raw: DataFrame, config: &CltvConfig) -> crate::Result<PredictionTable> {
    Ok(fit_cltv(raw, config)?.table)
}

/// Run the pipeline with the default estimators and keep the fitted models
pub fn fit_cltv(raw: DataFrame, config: &CltvConfig) -> crate::Result<FittedCltv<BetaGeoModel, GammaGammaModel>> {
    create_cltv_predictions_with(
        raw,
        config,
        &BetaGeoFitter::new(config.bgnbd_penalizer),
        &GammaGammaFitter::new(config.gamma_gamma_penalizer),
    )
}

/// Run the pipeline with any pair of estimators
pub fn create_cltv_predictions_with<PE, ME>(
    raw: DataFrame,
    config: &CltvConfig,
    purchase_estimator: &PE,
    monetary_estimator: &ME,
) -> crate::Result<FittedCltv<PE::Model, ME::Model>>
where
    PE: PurchaseFrequencyEstimator,
    ME: MonetaryValueEstimator,
{
    config.validate()?;

    let cleaned = clean_transactions(raw)?;
    let features = aggregate_features(&cleaned.frame, config.analysis_date)?;

    let purchase_model = purchase_estimator.fit(&features)?;
    let one_week = purchase_model.predict(ONE_WEEK, &features)?;
    let one_month = purchase_model.predict(ONE_MONTH, &features)?;
    let three_months = purchase_model.predict(THREE_MONTHS, &features)?;

    let monetary_model = monetary_estimator.fit(&features)?;
    let profit = monetary_model.predict_profit(&features)?;

    let clv = customer_lifetime_value(
        &purchase_model,
        &features,
        &profit,
        config.horizon_months,
        config.period_unit,
        config.discount_rate,
    )?;

    let (segments, segment_edges) = segment_by_quartile(&clv.to_vec())?;

    let rows = features
        .rows()
        .zip(segments)
        .enumerate()
        .map(|(i, (features, segment))| CustomerPrediction {
            features,
            expected_purchases_1_week: one_week[i],
            expected_purchases_1_month: one_month[i],
            expected_purchases_3_months: three_months[i],
            expected_average_profit: profit[i],
            clv: clv[i],
            segment,
        })
        .collect::<Vec<_>>();

    info!(
        customers = rows.len(),
        horizon_months = config.horizon_months,
        "computed lifetime value predictions"
    );

    Ok(FittedCltv {
        purchase_model,
        monetary_model,
        table: PredictionTable {
            rows,
            segment_edges,
            quantity_limits: cleaned.quantity_limits,
            price_limits: cleaned.price_limits,
        },
        config: config.clone(),
    })
}
