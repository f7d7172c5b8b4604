use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};
use jena_forecast::climate::{DATE_TIME_FORMAT, DATE_TIME_KEY};
use jena_forecast::persistence::PersistentModel;
use jena_forecast::training::TrainingConfig;
use jena_forecast::*;
use tempfile::tempdir;

fn write_climate_csv(rows: usize) -> String {
    let mut csv = String::from(DATE_TIME_KEY);
    for key in FEATURE_KEYS {
        write!(csv, ",{}", key).unwrap();
    }
    csv.push('\n');

    let start = NaiveDate::from_ymd_opt(2009, 1, 1)
        .unwrap()
        .and_hms_opt(0, 10, 0)
        .unwrap();
    for r in 0..rows {
        let time = start + Duration::minutes(10 * r as i64);
        write!(csv, "{}", time.format(DATE_TIME_FORMAT)).unwrap();
        for c in 0..FEATURE_KEYS.len() {
            let value = (r as f64 * 0.21 + c as f64).sin() * (c + 1) as f64 + 0.5 * c as f64;
            write!(csv, ",{:.4}", value).unwrap();
        }
        csv.push('\n');
    }
    csv
}

fn tiny_config() -> ForecastConfig {
    ForecastConfig {
        split_fraction: 0.6,
        step: 3,
        past: 12,
        future: 3,
        batch_size: 16,
        hidden_size: 4,
        epochs: 2,
        ..Default::default()
    }
}

#[test]
fn test_csv_to_forecasts() {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("jena_climate.csv");
    std::fs::write(&csv_path, write_climate_csv(200)).unwrap();

    let config = tiny_config();
    let table = ClimateTable::from_path(&csv_path).unwrap();
    assert_eq!(table.len(), 200);

    let data = prepare(&table, &config).unwrap();
    assert_eq!(data.num_features(), NUM_FEATURES);
    assert_eq!(data.split().train_split, 120);

    let train = data.train_windows().unwrap();
    let validation = data.validation_windows().unwrap();
    // training: min(120 - 9, 120); validation: min(65 - 9, 65)
    assert_eq!(train.num_windows(), 111);
    assert_eq!(validation.num_windows(), 56);

    let checkpoint = dir.path().join("best.json");
    let model = LstmRegressor::new(NUM_FEATURES, config.hidden_size, config.seed);
    let mut trainer = create_trainer(model, &config).with_normalization(data.stats().clone());
    trainer.config.checkpoint_path = Some(checkpoint.clone());

    let epochs_run = trainer.fit(&train, Some(&validation)).unwrap().len();
    assert_eq!(epochs_run, 2);
    assert!(checkpoint.exists());

    let (restored, metadata) = LstmRegressor::load(&checkpoint).unwrap();
    assert_eq!(metadata.sequence_length, config.sequence_length());
    assert_eq!(metadata.normalization.as_ref(), Some(data.stats()));
    assert!(metadata.epochs_trained >= 1 && metadata.epochs_trained <= 2);
    assert_eq!(restored.hidden_size, config.hidden_size);

    let forecasts = single_step_forecasts(&trainer, &validation, 5, config.forecast_delta());
    // 56 windows in batches of 16 -> 4 batches
    assert_eq!(forecasts.len(), 4);
    for forecast in &forecasts {
        assert_eq!(forecast.history.len(), config.sequence_length());
        assert_eq!(forecast.delta, 1);
        assert!(forecast.predicted.is_finite());
    }
    assert_eq!(
        forecasts[1].true_future,
        data.normalized()[[120 + 16 + 15, TARGET_FEATURE]]
    );

    let celsius = data.denormalize_target(forecasts[0].predicted);
    assert!(celsius.is_finite());
}

#[test]
fn test_trainer_without_checkpoint_writes_nothing() {
    let dir = tempdir().unwrap();
    let config = tiny_config();
    let table = ClimateTable::from_reader(write_climate_csv(200).as_bytes()).unwrap();
    let data = prepare(&table, &config).unwrap();
    let train = data.train_windows().unwrap();

    let model = LstmRegressor::new(NUM_FEATURES, 3, 1);
    let mut trainer = create_basic_trainer(model, 0.01).with_config(TrainingConfig {
        epochs: 1,
        ..TrainingConfig::default()
    });
    trainer.fit(&train, None).unwrap();

    assert_eq!(trainer.get_metrics_history().len(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_mismatched_model_width_is_rejected() {
    let config = tiny_config();
    let table = ClimateTable::from_reader(write_climate_csv(200).as_bytes()).unwrap();
    let data = prepare(&table, &config).unwrap();
    let train = data.train_windows().unwrap();

    let model = LstmRegressor::new(NUM_FEATURES + 1, 3, 1);
    let mut trainer = create_basic_trainer(model, 0.01);
    let result = trainer.fit(&train, None);
    assert!(matches!(result, Err(ForecastError::ShapeMismatch { .. })));
}

#[test]
fn test_checkpoint_keeps_only_improving_epochs() {
    let dir = tempdir().unwrap();
    let config = tiny_config();
    let table = ClimateTable::from_reader(write_climate_csv(200).as_bytes()).unwrap();
    let data = prepare(&table, &config).unwrap();
    let train = data.train_windows().unwrap();
    let validation = data.validation_windows().unwrap();

    for (name, early_stopping) in [
        ("plain.bin", None),
        ("with_stopper.bin", Some(EarlyStoppingConfig::default())),
    ] {
        let checkpoint = dir.path().join(name);
        // a zero learning rate leaves the loss flat across epochs
        let model = LstmRegressor::new(NUM_FEATURES, 4, 1);
        let mut trainer = create_basic_trainer(model, 0.0).with_config(TrainingConfig {
            epochs: 3,
            early_stopping,
            checkpoint_path: Some(checkpoint.clone()),
            ..TrainingConfig::default()
        });
        trainer.fit(&train, Some(&validation)).unwrap();

        let losses: Vec<f64> = trainer
            .get_metrics_history()
            .iter()
            .filter_map(|m| m.validation_loss)
            .collect();
        assert_eq!(losses.len(), 3);
        assert!(losses.windows(2).all(|pair| pair[0] == pair[1]));

        let (_, metadata) = LstmRegressor::load(&checkpoint).unwrap();
        assert_eq!(metadata.epochs_trained, 1);
        assert_eq!(metadata.best_loss, Some(losses[0]));
    }
}
