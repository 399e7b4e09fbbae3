//! Pipeline stages wired to the blob store.
//!
//! Every stage reads its inputs from, and writes its output to, the paths in
//! [`DatasetPaths`]. [`Runner::run_pipeline`] computes all stages in memory and
//! writes nothing unless every stage succeeded.

use crate::climatology::reference::HistoricalReference;
use crate::config::{AppConfig, DatasetPaths};
use crate::error::AqicastError;
use crate::model::evaluation::{evaluate, Metrics};
use crate::model::ridge::{LinearModel, RidgeRegression};
use crate::model::Predictor;
use crate::pipeline::aqi::{AqiCombiner, AqiFrame};
use crate::pipeline::canonical::CanonicalFrame;
use crate::pipeline::csv_io::read_csv;
use crate::pipeline::features::{derive_features, training_rows, FeatureTable};
use crate::pipeline::merge::merge_weather_and_aqi;
use crate::pipeline::resample::{DailyWeatherFrame, WeatherResampler};
use crate::storage::{read_blob, BlobStore};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::task;

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub holdout_rows: usize,
    /// Absent when the holdout is empty.
    pub holdout: Option<Metrics>,
}

#[derive(Clone)]
pub struct Runner {
    store: Arc<dyn BlobStore>,
    config: AppConfig,
}

impl Runner {
    pub fn new(store: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> Arc<dyn BlobStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn paths(&self) -> &DatasetPaths {
        &self.config.datasets
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), AqicastError> {
        let size = bytes.len();
        self.store.put(path, bytes).await?;
        info!("Saved {} ({} bytes)", path, size);
        Ok(())
    }

    async fn compute_daily_weather(&self) -> Result<DailyWeatherFrame, AqicastError> {
        let path = self.paths().raw_weather.clone();
        let bytes = read_blob(self.store.as_ref(), &path).await?;
        let resampler = WeatherResampler::new(self.config.weather.timestamp_columns.clone());
        let daily = task::spawn_blocking(move || {
            let raw = read_csv(bytes, &path)?;
            resampler.resample(&raw)
        })
        .await??;
        Ok(daily)
    }

    async fn compute_combined_aqi(&self) -> Result<AqiFrame, AqicastError> {
        let mut files = Vec::with_capacity(self.paths().raw_aqi.len());
        for path in &self.paths().raw_aqi {
            files.push((path.clone(), read_blob(self.store.as_ref(), path).await?));
        }
        Ok(AqiCombiner::new().combine_csv(files)?)
    }

    /// Fits on the complete rows of `features` and scores the holdout.
    fn fit(&self, features: &FeatureTable) -> Result<(LinearModel, TrainingReport), AqicastError> {
        let settings = &self.config.training;
        let table = training_rows(features, settings.min_rows)?;
        let matrix = table.matrix();
        let targets = table.targets();
        let (train, holdout) = matrix.split_tail(settings.holdout_fraction);
        let (train_targets, holdout_targets) = targets.split_at(train.n_rows());

        let model = RidgeRegression::new(settings.alpha).fit(&train, train_targets)?;
        let metrics = if holdout.n_rows() > 0 {
            let metrics = evaluate(&model, &holdout, holdout_targets)?;
            info!("Holdout evaluation: {}", metrics);
            Some(metrics)
        } else {
            warn!("Holdout is empty; the model is not evaluated");
            None
        };

        let report = TrainingReport {
            rows: table.len(),
            train_rows: train.n_rows(),
            holdout_rows: holdout.n_rows(),
            holdout: metrics,
        };
        Ok((model, report))
    }

    /// Resamples raw weather to daily aggregates.
    pub async fn resample(&self) -> Result<DailyWeatherFrame, AqicastError> {
        let daily = self.compute_daily_weather().await?;
        self.put(&self.paths().daily_weather, daily.to_csv()?).await?;
        Ok(daily)
    }

    /// Combines the raw AQI files.
    pub async fn combine(&self) -> Result<AqiFrame, AqicastError> {
        let combined = self.compute_combined_aqi().await?;
        self.put(&self.paths().combined_aqi, combined.to_csv()?).await?;
        Ok(combined)
    }

    /// Merges the stored daily weather and combined AQI.
    pub async fn merge(&self) -> Result<CanonicalFrame, AqicastError> {
        let daily = DailyWeatherFrame::from_csv(
            self.store.get(&self.paths().daily_weather).await?,
            &self.paths().daily_weather,
        )?;
        let combined = AqiFrame::from_csv(
            self.store.get(&self.paths().combined_aqi).await?,
            &self.paths().combined_aqi,
        )?;
        let merged = merge_weather_and_aqi(&daily, &combined)?;
        self.put(&self.paths().merged, merged.to_csv()?).await?;
        Ok(merged)
    }

    /// Derives the feature table from the stored canonical dataset.
    pub async fn features(&self) -> Result<FeatureTable, AqicastError> {
        let merged = self.load_canonical().await?;
        let table = derive_features(&merged)?;
        self.put(&self.paths().features, table.to_csv()?).await?;
        Ok(table)
    }

    /// Trains on the stored canonical dataset and saves the model artifact.
    pub async fn train(&self) -> Result<TrainingReport, AqicastError> {
        let merged = self.load_canonical().await?;
        let (model, report) = self.fit(&derive_features(&merged)?)?;
        self.put(&self.paths().model, model.to_bytes()?).await?;
        Ok(report)
    }

    /// Runs every stage from the raw inputs. Outputs are written only after the
    /// last stage succeeded.
    pub async fn run_pipeline(&self) -> Result<TrainingReport, AqicastError> {
        let daily = self.compute_daily_weather().await?;
        let combined = self.compute_combined_aqi().await?;
        let merged = merge_weather_and_aqi(&daily, &combined)?;
        let table = derive_features(&merged)?;
        let (model, report) = self.fit(&table)?;

        let outputs = [
            (&self.paths().daily_weather, daily.to_csv()?),
            (&self.paths().combined_aqi, combined.to_csv()?),
            (&self.paths().merged, merged.to_csv()?),
            (&self.paths().features, table.to_csv()?),
            (&self.paths().model, model.to_bytes()?),
        ];
        for (path, bytes) in outputs {
            self.put(path, bytes).await?;
        }
        Ok(report)
    }

    pub async fn load_canonical(&self) -> Result<CanonicalFrame, AqicastError> {
        let path = &self.paths().merged;
        Ok(CanonicalFrame::from_csv(self.store.get(path).await?, path)?)
    }

    pub async fn load_reference(&self) -> Result<HistoricalReference, AqicastError> {
        let canonical = self.load_canonical().await?;
        Ok(HistoricalReference::from_canonical(&canonical)?)
    }

    pub async fn load_model(&self) -> Result<LinearModel, AqicastError> {
        let bytes = self.store.get(&self.paths().model).await?;
        Ok(LinearModel::from_bytes(&bytes)?)
    }
}
