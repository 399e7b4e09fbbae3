//! HTTP surface: predictions and CSV passthrough of stored datasets.

pub mod error;
pub mod handlers;

use crate::climatology::reference::HistoricalReference;
use crate::climatology::ClimatologyPredictor;
use crate::config::{DatasetPaths, ServerSettings};
use crate::model::Model;
use crate::runner::Runner;
use crate::server::error::ApiError;
use crate::storage::BlobStore;
use axum::routing::{get, post};
use axum::Router;
use log::{error, info};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
///
/// Built once at startup and never mutated. A dataset or model that failed to
/// load stays absent for the life of the process and the endpoints needing it
/// answer 503.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn BlobStore>,
    pub datasets: Arc<DatasetPaths>,
    reference: Option<Arc<HistoricalReference>>,
    model: Option<Arc<dyn Model>>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn BlobStore>,
        datasets: DatasetPaths,
        reference: Option<Arc<HistoricalReference>>,
        model: Option<Arc<dyn Model>>,
    ) -> Self {
        Self {
            store,
            datasets: Arc::new(datasets),
            reference,
            model,
        }
    }

    /// Loads the historical reference and the model through `runner`.
    pub async fn load(runner: &Runner) -> Self {
        let reference = match runner.load_reference().await {
            Ok(reference) => {
                info!("Historical reference ready ({} days)", reference.len());
                Some(Arc::new(reference))
            }
            Err(e) => {
                error!("Historical reference unavailable: {}", e);
                None
            }
        };
        let model: Option<Arc<dyn Model>> = match runner.load_model().await {
            Ok(model) => {
                info!("Model ready ({} features)", model.feature_order().len());
                Some(Arc::new(model))
            }
            Err(e) => {
                error!("Model unavailable: {}", e);
                None
            }
        };
        Self::new(
            runner.store(),
            runner.config().datasets.clone(),
            reference,
            model,
        )
    }

    pub fn predictor(&self) -> Result<ClimatologyPredictor, ApiError> {
        let reference = self.reference.clone().ok_or_else(|| {
            ApiError::DataUnavailable("historical dataset is not loaded".to_string())
        })?;
        let model = self
            .model
            .clone()
            .ok_or_else(|| ApiError::ModelUnavailable("no trained model is loaded".to_string()))?;
        Ok(ClimatologyPredictor::new(reference, model))
    }

    /// Blob path of a servable dataset by its public name.
    pub fn dataset_path(&self, name: &str) -> Option<&str> {
        let path = match name {
            "daily_weather" => &self.datasets.daily_weather,
            "combined_aqi" => &self.datasets.combined_aqi,
            "merged" => &self.datasets.merged,
            "features" => &self.datasets.features,
            _ => return None,
        };
        Some(path.as_str())
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/predict", post(handlers::predict))
        .route("/predict/:date", get(handlers::predict_date))
        .route("/data/:dataset", get(handlers::dataset_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

pub async fn serve(ctx: AppContext, settings: &ServerSettings) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
