pub mod climatology;
pub mod config;
mod error;
pub mod model;
pub mod pipeline;
pub mod runner;
pub mod server;
pub mod storage;
pub mod types;
mod utils;

pub use error::AqicastError;

pub use climatology::reference::HistoricalReference;
pub use climatology::{ClimatologyPredictor, Prediction};
pub use config::AppConfig;
pub use model::ridge::{LinearModel, RidgeRegression};
pub use model::{FeatureMatrix, Model, Predictor};
pub use pipeline::canonical::CanonicalFrame;
pub use pipeline::error::PipelineError;
pub use pipeline::features::{derive_features, derive_training_set, training_rows, FeatureTable};
pub use runner::{Runner, TrainingReport};
pub use storage::error::StorageError;
pub use storage::BlobStore;
pub use types::feature_vector::FeatureVector;
