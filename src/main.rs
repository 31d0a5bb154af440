//! CLTVForge: customer lifetime value prediction CLI
//!
//! This is the main entrypoint that orchestrates data loading, model fitting,
//! segmentation, reporting and prediction.

use anyhow::Result;
use clap::Parser;
use cltvforge::model::{MonetaryValueModel, PurchaseFrequencyModel};
use cltvforge::{fit_cltv, load_transactions, report, Args, CltvConfig};
use polars::prelude::*;
use std::fs::File;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.verbose {
        println!("CLTVForge - Customer Lifetime Value with BG/NBD and Gamma-Gamma");
        println!("===============================================================\n");
    }

    let config = args.to_config()?;

    if let Some(customer) = args.parse_customer_features()? {
        run_prediction_mode(&args, &config, customer)?;
    } else {
        run_full_pipeline(&args, &config)?;
    }

    Ok(())
}

/// Score a single hypothetical customer with models fitted on the input data
fn run_prediction_mode(
    args: &Args,
    config: &CltvConfig,
    customer: cltvforge::CustomerFeatures,
) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!(
        "Input: frequency={}, recency={} weeks, T={} weeks, monetary={}",
        customer.frequency, customer.recency_weeks, customer.age_weeks, customer.monetary_value
    );

    let start_time = Instant::now();

    info!(input = %args.input, "loading training data");
    let raw = load_transactions(&args.input)?;
    let fitted = fit_cltv(raw, config)?;
    let score = fitted.score(customer)?;

    println!("\n✓ Predicted segment: {}", score.segment);
    println!("  Expected purchases (1 week):   {:.4}", score.expected_purchases_1_week);
    println!("  Expected purchases (1 month):  {:.4}", score.expected_purchases_1_month);
    println!("  Expected purchases (3 months): {:.4}", score.expected_purchases_3_months);
    println!("  Expected average profit:       {:.2}", score.expected_average_profit);
    println!(
        "  CLV ({} months):               {:.2}",
        config.horizon_months, score.clv
    );
    println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Run the full prediction pipeline and print the reports
fn run_full_pipeline(args: &Args, config: &CltvConfig) -> Result<()> {
    println!("=== Full CLTV Pipeline ===\n");

    let start_time = Instant::now();

    // Step 1: Load data
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input);
    }
    let raw = load_transactions(&args.input)?;
    println!("✓ Data loaded: {} transaction lines", raw.height());

    // Step 2: Clean, aggregate, fit and segment
    if args.verbose {
        println!("\nStep 2: Fitting models");
        println!("  Analysis date: {}", config.analysis_date);
        println!("  Horizon: {} months", config.horizon_months);
        println!("  Discount rate: {}", config.discount_rate);
    }
    let model_start = Instant::now();
    let fitted = fit_cltv(raw, config)?;
    println!("✓ Models fitted on {} repeat customers", fitted.table.len());
    if args.verbose {
        println!("  Fitting time: {:.2}s", model_start.elapsed().as_secs_f64());
    }

    report::print_parameters("BG/NBD", &fitted.purchase_model.parameters());
    report::print_parameters("Gamma-Gamma", &fitted.monetary_model.parameters());

    // Step 3: Reports
    let table = &fitted.table;
    report::print_overview(table);
    report::print_top_customers(table, "expected purchases in 1 week", args.top, |row| {
        row.expected_purchases_1_week
    });
    report::print_top_customers(table, "expected purchases in 1 month", args.top, |row| {
        row.expected_purchases_1_month
    });
    report::print_top_customers(table, "CLV", args.top, |row| row.clv);
    report::print_segment_summary(table);

    // Step 4: Persist
    if let Some(ref output) = args.output {
        let mut df = table.to_dataframe()?;
        let mut file = File::create(output)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        println!("\nPrediction table saved to: {}", output);
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
