//! churnlens: churn analytics CLI
//!
//! This is the main entrypoint that loads the artifacts once and runs either
//! a dashboard pass for the chosen locations or a single manual prediction.

use std::time::Instant;

use anyhow::{Context, Result};
use churnlens::{
    encode_raw, evaluate_model, generate_dashboard_charts, predict_churn, run_dashboard, viz, Args,
    CorrelationMatrix, DataStore, DecisionTable, RandomForest, RawPredictionForm,
};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "churnlens=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if args.verbose {
        println!("churnlens - Customer Churn Analytics");
        println!("====================================\n");
    }

    // Check if in prediction mode
    if let Some(form) = args.parse_prediction_form()? {
        run_prediction_mode(&args, &form)?;
    } else {
        run_dashboard_mode(&args)?;
    }

    Ok(())
}

/// Score one manually entered customer
fn run_prediction_mode(args: &Args, form: &RawPredictionForm) -> Result<()> {
    println!("=== Manual Input for Prediction ===");

    // Reject the form before touching any artifact
    let input = encode_raw(form)?;
    println!("Encoded input: {}", input);
    if args.verbose {
        println!("\nLoading model from: {}", args.model.display());
    }

    let start_time = Instant::now();
    let model = RandomForest::load(&args.model)?;
    let prediction = predict_churn(&model, &input);
    let elapsed = start_time.elapsed();

    println!("\n=== Prediction Result ===");
    println!("The model predicts '{}'.", prediction);
    if args.verbose {
        println!("  Processing time: {:.2}s", elapsed.as_secs_f64());
    }

    Ok(())
}

/// Run the full dashboard for the selected locations
fn run_dashboard_mode(args: &Args) -> Result<()> {
    let selection = args.selection();
    selection.validate()?;

    let start_time = Instant::now();

    // Step 1: Load artifacts
    if args.verbose {
        println!("Step 1: Loading artifacts");
        println!("  Decision table: {}", args.decisions.display());
        println!("  Correlation matrix: {}", args.correlations.display());
        println!("  Model: {}", args.model.display());
    }
    let decisions = DecisionTable::load(&args.decisions)?;
    let correlations = CorrelationMatrix::load(&args.correlations)?;
    let model = RandomForest::load(&args.model)?;
    println!("✓ Data loaded: {} customers", decisions.height());

    // Step 2: Dashboard pass
    if args.verbose {
        println!("\nStep 2: Summarizing segments for {}", selection.caption());
    }
    let store = DataStore {
        decisions: &decisions,
        correlations: &correlations,
    };
    let report = run_dashboard(store, selection)?;
    viz::print_dashboard(&report);

    // Step 3: Model evaluation
    if args.verbose {
        println!("\nStep 3: Evaluating model");
        println!("  Test ratio: {}", args.test_ratio);
        println!("  Seed: {}", args.seed);
    }
    let evaluation = evaluate_model(&model, &decisions, args.test_ratio, args.seed)?;
    viz::print_evaluation(&evaluation);

    // Step 4: Charts
    if args.verbose {
        println!("\nStep 4: Rendering charts");
        println!("  Output directory: {}", args.output_dir.display());
    }
    let written = generate_dashboard_charts(&report, Some(&evaluation), &args.output_dir)
        .with_context(|| format!("rendering charts into {}", args.output_dir.display()))?;
    println!("\n✓ {} charts saved to: {}", written.len(), args.output_dir.display());

    let total_time = start_time.elapsed();
    println!("\n=== Dashboard Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}
