//! Train the temperature forecaster on the Jena climate recordings.
//!
//! ```text
//! cargo run --release --example jena_forecast -- jena_climate_2009_2016.csv --epochs 2
//! ```
//!
//! Set `RUST_LOG=debug` to see per-batch losses.

use clap::Parser;
use jena_forecast::features::selected_titles;
use jena_forecast::{
    create_trainer, prepare, single_step_forecasts, ClimateTable, ForecastConfig, LstmRegressor,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Path to jena_climate_2009_2016.csv.
    csv: PathBuf,

    /// JSON file overriding any subset of the default parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of training epochs.
    #[arg(long)]
    epochs: Option<usize>,

    /// Where to keep the best model seen so far (.json or binary).
    #[arg(long, default_value = "jena_forecast_best.bin")]
    checkpoint: PathBuf,

    /// Single-step forecasts to print after training.
    #[arg(long, default_value_t = 5)]
    forecasts: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_json_file(path)?,
        None => ForecastConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }

    let table = ClimateTable::from_path(&args.csv)?;
    println!("Loaded {} rows, selected features: {}", table.len(), selected_titles().join(", "));

    let data = prepare(&table, &config)?;
    let train = data.train_windows()?;
    let validation = data.validation_windows()?;

    if let Some(batch) = train.batch(0) {
        println!("Input shape: {:?}", batch.inputs.shape());
        println!("Target shape: {:?}", batch.targets.shape());
    }
    println!(
        "Training windows: {} ({} batches), validation windows: {}",
        train.num_windows(),
        train.num_batches(),
        validation.num_windows()
    );

    let model = LstmRegressor::new(data.num_features(), config.hidden_size, config.seed);
    println!("Model parameters: {}", model.num_parameters());

    let mut trainer = create_trainer(model, &config).with_normalization(data.stats().clone());
    trainer.config.checkpoint_path = Some(args.checkpoint.clone());
    trainer.fit(&train, Some(&validation))?;

    println!("\nEpoch  train_loss  val_loss");
    for metrics in trainer.get_metrics_history() {
        println!(
            "{:>5}  {:>10.5}  {:>8.5}",
            metrics.epoch + 1,
            metrics.train_loss,
            metrics.validation_loss.unwrap_or(f64::NAN)
        );
    }

    println!("\nSingle step forecasts ({} steps ahead):", config.forecast_delta());
    for (i, forecast) in single_step_forecasts(&trainer, &validation, args.forecasts, config.forecast_delta())
        .iter()
        .enumerate()
    {
        println!(
            "  #{}: true {:.2} degC, predicted {:.2} degC",
            i + 1,
            data.denormalize_target(forecast.true_future),
            data.denormalize_target(forecast.predicted)
        );
    }

    println!("\nBest model written to {}", args.checkpoint.display());
    Ok(())
}
