//! Console reports for fitted models and lifetime value predictions

use crate::pipeline::{CustomerPrediction, PredictionTable};
use crate::segment::Segment;

/// Count, mean and total lifetime value of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub segment: Segment,
    pub count: usize,
    pub mean_clv: f64,
    pub total_clv: f64,
}

/// Per-segment statistics, highest-value segment first
pub fn segment_summary(table: &PredictionTable) -> Vec<SegmentStats> {
    Segment::ALL
        .iter()
        .rev()
        .map(|&segment| {
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter(|row| row.segment == segment)
                .map(|row| row.clv)
                .collect();
            let total_clv: f64 = values.iter().sum();
            let mean_clv = if values.is_empty() {
                0.0
            } else {
                total_clv / values.len() as f64
            };
            SegmentStats {
                segment,
                count: values.len(),
                mean_clv,
                total_clv,
            }
        })
        .collect()
}

/// Print per-segment lifetime value statistics
pub fn print_segment_summary(table: &PredictionTable) {
    println!("\n=== Segment Summary ===");
    println!("  Segment |  Count |     Mean CLV |    Total CLV");
    println!("  --------|--------|--------------|-------------");
    for stats in segment_summary(table) {
        println!(
            "  {:>7} | {:>6} | {:>12.2} | {:>12.2}",
            stats.segment, stats.count, stats.mean_clv, stats.total_clv
        );
    }

    let edges: Vec<String> = table
        .segment_edges
        .edges
        .iter()
        .map(|edge| format!("{:.2}", edge))
        .collect();
    println!("\nSegment edges (CLV): {}", edges.join(" | "));
}

/// Print the `n` customers with the highest value of `key`
pub fn print_top_customers<F>(table: &PredictionTable, title: &str, n: usize, key: F)
where
    F: Fn(&CustomerPrediction) -> f64,
{
    println!("\n=== Top {} customers by {} ===", n, title);
    println!("  Customer | Frequency | Recency (w) |  T (w) | Monetary |    Value | Segment");
    println!("  ---------|-----------|-------------|--------|----------|----------|--------");
    for row in table.top_by(n, &key) {
        println!(
            "  {:>8} | {:>9.0} | {:>11.2} | {:>6.2} | {:>8.2} | {:>8.4} | {:>7}",
            row.features.customer_id,
            row.features.frequency,
            row.features.recency_weeks,
            row.features.age_weeks,
            row.features.monetary_value,
            key(row),
            row.segment
        );
    }
}

/// Print the fitted parameters of a model
pub fn print_parameters(model_name: &str, parameters: &[(&'static str, f64)]) {
    let formatted: Vec<String> = parameters
        .iter()
        .map(|(name, value)| format!("{}={:.4}", name, value))
        .collect();
    println!("{} parameters: {}", model_name, formatted.join(", "));
}

/// Print run-level totals
pub fn print_overview(table: &PredictionTable) {
    let expected_month: f64 = table.rows.iter().map(|row| row.expected_purchases_1_month).sum();
    let total_clv: f64 = table.rows.iter().map(|row| row.clv).sum();

    println!("\n=== Overview ===");
    println!("Repeat customers: {}", table.len());
    println!("Expected purchases in the next month: {:.1}", expected_month);
    println!("Total predicted CLV: {:.2}", total_clv);
    println!(
        "Quantity capped to [{:.2}, {:.2}], price capped to [{:.2}, {:.2}]",
        table.quantity_limits.low_limit,
        table.quantity_limits.up_limit,
        table.price_limits.low_limit,
        table.price_limits.up_limit
    );
}
