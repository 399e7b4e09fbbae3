//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Defaults in code
//! 2. An optional TOML file (`aqicast.toml`, or the path given on the command line)
//! 3. Environment variables with the `AQICAST__` prefix, e.g.
//!    `AQICAST__STORAGE__BACKEND=gcs` or `AQICAST__DATASETS__RAW_AQI=a.csv,b.csv`

use crate::storage::StorageSettings;
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "aqicast.toml";
const ENV_PREFIX: &str = "AQICAST";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub datasets: DatasetPaths,
    pub weather: WeatherSettings,
    pub training: TrainingSettings,
    pub server: ServerSettings,
}

/// Blob paths of every input and output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetPaths {
    pub raw_weather: String,
    /// One file per period; all are combined. `.gz` files are decompressed.
    pub raw_aqi: Vec<String>,
    pub daily_weather: String,
    pub combined_aqi: String,
    pub merged: String,
    pub features: String,
    pub model: String,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            raw_weather: "raw/weather.csv".to_string(),
            raw_aqi: vec!["raw/aqi.csv".to_string()],
            daily_weather: "derived/daily_weather.csv".to_string(),
            combined_aqi: "derived/combined_aqi.csv".to_string(),
            merged: "derived/merged_weather_aqi.csv".to_string(),
            features: "derived/features.csv".to_string(),
            model: "models/trained_model.bin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    /// Columns whose space-joined text forms the observation timestamp.
    pub timestamp_columns: Vec<String>,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            timestamp_columns: vec!["dt_iso".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Ridge penalty.
    pub alpha: f64,
    /// Trailing share of rows held out for evaluation.
    pub holdout_fraction: f64,
    pub min_rows: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            holdout_fraction: 0.2,
            min_rows: crate::pipeline::features::MIN_TRAINING_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Loads defaults, then `file` (or `aqicast.toml` when present), then the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("datasets.raw_aqi")
                    .with_list_parse_key("weather.timestamp_columns"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::credentials::CredentialStrategy;
    use crate::storage::StorageBackend;
    use config::FileFormat;

    #[test]
    fn test_file_overrides_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let toml = r#"
            [storage]
            backend = "gcs"
            bucket = "weather-aqi-data-storage"
            credentials = "env_base64"

            [datasets]
            raw_aqi = ["aqi/denver_aqi_2014.csv", "aqi/denver_aqi_2015.csv.gz"]

            [training]
            alpha = 0.5
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.storage.credentials, CredentialStrategy::EnvBase64);
        assert_eq!(config.datasets.raw_aqi.len(), 2);
        assert_eq!(config.training.alpha, 0.5);
        // untouched values keep their defaults
        assert_eq!(config.training.min_rows, 8);
        assert_eq!(config.datasets.model, "models/trained_model.bin");
        assert_eq!(config.server.port, 8080);
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/aqicast.toml"))).is_err());
    }
}
