//! AQI estimates for arbitrary dates from day-of-year climatology.
//!
//! For a query date the weather inputs are the means of every historical day
//! sharing its day of year. When the record has no such day (Feb 29 against
//! non-leap history, for example) the means over the whole record are used
//! instead. The estimate is never refused for lack of analogs.

pub mod reference;

use crate::climatology::reference::{ColumnMeans, HistoricalReference};
use crate::model::error::ModelError;
use crate::model::{FeatureMatrix, Model};
use crate::types::calendar::CalendarFeatures;
use crate::types::columns::*;
use crate::types::feature_vector::{FeatureVector, WeatherInputs};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

/// The reconstructed model input for a query date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimatologyInputs {
    pub features: FeatureVector,
    /// Historical rows sharing the query's day of year.
    pub analog_days: usize,
    /// True when no analog existed and record-wide means were used.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub aqi: f64,
    pub analog_days: usize,
    pub fallback: bool,
}

/// Feeds climatological feature vectors to a fitted model.
///
/// Both the reference and the model are shared read-only; cloning the
/// predictor is cheap.
#[derive(Clone)]
pub struct ClimatologyPredictor {
    reference: Arc<HistoricalReference>,
    model: Arc<dyn Model>,
}

impl ClimatologyPredictor {
    pub fn new(reference: Arc<HistoricalReference>, model: Arc<dyn Model>) -> Self {
        Self { reference, model }
    }

    pub fn reference(&self) -> &HistoricalReference {
        &self.reference
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Builds the feature vector for `date`.
    ///
    /// Weather means come from the day-of-year analogs, falling back per
    /// column to the record-wide mean when the analogs have no value. The
    /// rolling-average features take the climatological mean of their base
    /// column. Lag features take the mean of an `AQI_lag_*` column when the
    /// reference carries one, otherwise the record-wide mean AQI. Calendar
    /// features are computed from `date` itself.
    pub fn inputs_for(&self, date: NaiveDate) -> ClimatologyInputs {
        let day_of_year = date.ordinal();
        let analogs = self.reference.day_of_year_means(day_of_year);
        let global = self.reference.global_means();
        let fallback = analogs.rows == 0;
        if fallback {
            warn!(
                "No historical analog for day of year {} ({}); using record-wide means",
                day_of_year, date
            );
        } else {
            debug!(
                "Day of year {} has {} historical analogs",
                day_of_year, analogs.rows
            );
        }

        let means = if fallback { global } else { &analogs };
        let mean = |column: &str| climatological(means, global, column);
        let aqi_mean = global.get(AQI_VALUE).unwrap_or(f64::NAN);
        let lag = |column: &str| means.get(column).or_else(|| global.get(column)).unwrap_or(aqi_mean);

        let weather = WeatherInputs {
            temp_mean: mean(TEMP_MEAN),
            temp_max_mean: mean(TEMP_MAX_MEAN),
            temp_min_mean: mean(TEMP_MIN_MEAN),
            wind_speed_mean: mean(WIND_SPEED_MEAN),
            humidity_mean: mean(HUMIDITY_MEAN),
            pressure_mean: mean(PRESSURE_MEAN),
            clouds_all_mean: mean(CLOUDS_ALL_MEAN),
            aqi_lag_1: lag(AQI_LAG_1),
            aqi_lag_3: lag(AQI_LAG_3),
            temp_mean_7d_avg: means
                .get(TEMP_MEAN_7D_AVG)
                .unwrap_or_else(|| mean(TEMP_MEAN)),
            humidity_mean_7d_avg: means
                .get(HUMIDITY_MEAN_7D_AVG)
                .unwrap_or_else(|| mean(HUMIDITY_MEAN)),
        };

        ClimatologyInputs {
            features: FeatureVector::new(weather, CalendarFeatures::from_date(date)),
            analog_days: analogs.rows,
            fallback,
        }
    }

    /// Estimates the AQI of `date`.
    ///
    /// # Errors
    ///
    /// Only model failures: a feature the model expects that this predictor
    /// cannot supply, or a non-finite input.
    pub fn predict(&self, date: NaiveDate) -> Result<Prediction, ModelError> {
        let inputs = self.inputs_for(date);
        let order = self.model.feature_order();
        let row = order
            .iter()
            .map(|name| inputs.features.get(name))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| ModelError::FeatureMismatch {
                expected: order.to_vec(),
                found: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            })?;

        let matrix = FeatureMatrix::new(order.to_vec(), vec![row]);
        let aqi = self
            .model
            .predict(&matrix)?
            .first()
            .copied()
            .ok_or(ModelError::NoPrediction)?;

        Ok(Prediction {
            date,
            aqi,
            analog_days: inputs.analog_days,
            fallback: inputs.fallback,
        })
    }
}

fn climatological(means: &ColumnMeans, global: &ColumnMeans, column: &str) -> f64 {
    means
        .get(column)
        .or_else(|| global.get(column))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ridge::RidgeRegression;
    use crate::model::Predictor;
    use crate::pipeline::canonical::tests::synthetic;
    use crate::pipeline::canonical::CanonicalFrame;
    use crate::pipeline::features::derive_training_set;

    /// Predicts the sum of its inputs, in whatever order it was given.
    struct SumModel {
        order: Vec<String>,
    }

    impl Model for SumModel {
        fn feature_order(&self) -> &[String] {
            &self.order
        }

        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
            self.check_columns(features)?;
            Ok(features.rows().iter().map(|r| r.iter().sum()).collect())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn reference(start: NaiveDate, days: usize) -> Arc<HistoricalReference> {
        Arc::new(HistoricalReference::from_canonical(&synthetic(start, days)).unwrap())
    }

    #[test]
    fn test_missing_day_of_year_falls_back_to_global_means() -> Result<(), Box<dyn std::error::Error>> {
        // days of year 1..=360 of 2023
        let history = synthetic(d(2023, 1, 1), 360);
        let reference = Arc::new(HistoricalReference::from_canonical(&history)?);
        let training = derive_training_set(&history, 8)?;
        let model = RidgeRegression::default().fit(&training.matrix(), &training.targets())?;
        let predictor = ClimatologyPredictor::new(reference.clone(), Arc::new(model));

        let query = d(2025, 12, 31);
        assert_eq!(query.ordinal(), 365);
        let prediction = predictor.predict(query)?;
        assert!(prediction.fallback);
        assert_eq!(prediction.analog_days, 0);
        assert!(prediction.aqi.is_finite());

        let inputs = predictor.inputs_for(query);
        let global = reference.global_means();
        assert_eq!(inputs.features.temp_mean, global.get(TEMP_MEAN).unwrap());
        assert_eq!(inputs.features.aqi_lag_1, global.get(AQI_VALUE).unwrap());
        Ok(())
    }

    #[test]
    fn test_analog_days_and_calendar_features() {
        let predictor = ClimatologyPredictor::new(
            reference(d(2022, 1, 1), 730),
            Arc::new(SumModel {
                order: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            }),
        );
        let inputs = predictor.inputs_for(d(2030, 1, 1));
        assert!(!inputs.fallback);
        assert_eq!(inputs.analog_days, 2);
        // temp on the two Jan 1sts is 5 and 13
        assert_eq!(inputs.features.temp_mean, 9.0);
        assert_eq!(inputs.features.temp_mean_7d_avg, 9.0);
        assert_eq!(inputs.features.temp_mean_squared, 81.0);
        // 2030-01-01 is a Tuesday, not carried over from history
        assert_eq!(inputs.features.day_of_week, 1.0);
        assert_eq!(inputs.features.is_weekend, 0.0);
        assert_eq!(inputs.features.season, 1.0);
        assert!(inputs.features.is_finite());
    }

    #[test]
    fn test_rolling_averages_take_the_base_column_climatology() {
        let reference = reference(d(2022, 1, 1), 730);
        assert!(!reference.has_column(TEMP_MEAN_7D_AVG));
        assert!(!reference.has_column(HUMIDITY_MEAN_7D_AVG));
        let predictor = ClimatologyPredictor::new(
            reference,
            Arc::new(SumModel {
                order: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            }),
        );

        let inputs = predictor.inputs_for(d(2030, 3, 15));
        assert!(!inputs.fallback);
        assert_eq!(inputs.features.temp_mean_7d_avg, inputs.features.temp_mean);
        assert_eq!(inputs.features.humidity_mean_7d_avg, inputs.features.humidity_mean);
        assert!(inputs.features.humidity_mean_7d_avg > 0.0);
    }

    #[test]
    fn test_column_missing_on_analog_days_uses_global_mean() -> Result<(), Box<dyn std::error::Error>> {
        let csv = "datetime,temp_mean,temp_max_mean,temp_min_mean,wind_speed_mean,humidity_mean,pressure_mean,clouds_all_mean,AQI Value\n\
                   2022-01-01,5,7,3,,30,1000,10,40\n\
                   2022-01-02,6,8,4,3,31,1001,11,42\n\
                   2022-06-01,20,22,18,5,50,1005,20,60\n\
                   2023-01-01,7,9,5,,32,1002,12,44\n";
        let canonical = CanonicalFrame::from_csv(csv.as_bytes().to_vec(), "merged.csv")?;
        let predictor = ClimatologyPredictor::new(
            Arc::new(HistoricalReference::from_canonical(&canonical)?),
            Arc::new(SumModel {
                order: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            }),
        );

        let inputs = predictor.inputs_for(d(2030, 1, 1));
        assert!(!inputs.fallback);
        assert_eq!(inputs.analog_days, 2);
        assert_eq!(inputs.features.temp_mean, 6.0);
        assert_eq!(inputs.features.pressure_mean, 1001.0);
        // wind is blank on both Jan 1sts, so the record-wide mean is used
        assert_eq!(inputs.features.wind_speed_mean, 4.0);
        assert!(predictor.predict(d(2030, 1, 1))?.aqi.is_finite());
        Ok(())
    }

    #[test]
    fn test_inputs_follow_model_order() -> Result<(), Box<dyn std::error::Error>> {
        let order = vec![SEASON.to_string(), IS_WEEKEND.to_string()];
        let predictor = ClimatologyPredictor::new(
            reference(d(2022, 1, 1), 30),
            Arc::new(SumModel { order }),
        );
        // 2024-07-06 is a Saturday in season 3
        let prediction = predictor.predict(d(2024, 7, 6))?;
        assert_eq!(prediction.aqi, 4.0);
        assert!(prediction.fallback);
        Ok(())
    }

    #[test]
    fn test_unknown_model_feature_is_an_error() {
        let predictor = ClimatologyPredictor::new(
            reference(d(2022, 1, 1), 30),
            Arc::new(SumModel {
                order: vec!["month".to_string()],
            }),
        );
        assert!(matches!(
            predictor.predict(d(2022, 1, 5)),
            Err(ModelError::FeatureMismatch { .. })
        ));
    }
}
