use crate::types::calendar::CalendarFeatures;
use crate::types::columns::*;
use serde::{Deserialize, Serialize};

/// One row of model inputs. An input with no value is NaN.
///
/// Field names follow the column names of the feature table; [`FeatureVector::get`]
/// resolves a column name to its value so a model can pull inputs in whatever
/// order it declared at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub temp_mean: f64,
    pub temp_max_mean: f64,
    pub temp_min_mean: f64,
    pub wind_speed_mean: f64,
    pub humidity_mean: f64,
    pub pressure_mean: f64,
    pub clouds_all_mean: f64,
    pub season: f64,
    pub day_of_year: f64,
    pub day_of_week: f64,
    pub is_weekend: f64,
    pub aqi_lag_1: f64,
    pub aqi_lag_3: f64,
    pub temp_mean_7d_avg: f64,
    pub humidity_mean_7d_avg: f64,
    pub temp_mean_squared: f64,
}

/// The weather-derived part of a [`FeatureVector`], everything except the calendar fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherInputs {
    pub temp_mean: f64,
    pub temp_max_mean: f64,
    pub temp_min_mean: f64,
    pub wind_speed_mean: f64,
    pub humidity_mean: f64,
    pub pressure_mean: f64,
    pub clouds_all_mean: f64,
    pub aqi_lag_1: f64,
    pub aqi_lag_3: f64,
    pub temp_mean_7d_avg: f64,
    pub humidity_mean_7d_avg: f64,
}

impl FeatureVector {
    /// Combines weather inputs with calendar features; `temp_mean_squared` is
    /// always derived from `weather.temp_mean`.
    pub fn new(weather: WeatherInputs, calendar: CalendarFeatures) -> Self {
        Self {
            temp_mean: weather.temp_mean,
            temp_max_mean: weather.temp_max_mean,
            temp_min_mean: weather.temp_min_mean,
            wind_speed_mean: weather.wind_speed_mean,
            humidity_mean: weather.humidity_mean,
            pressure_mean: weather.pressure_mean,
            clouds_all_mean: weather.clouds_all_mean,
            season: calendar.season as f64,
            day_of_year: calendar.day_of_year as f64,
            day_of_week: calendar.day_of_week as f64,
            is_weekend: if calendar.is_weekend { 1.0 } else { 0.0 },
            aqi_lag_1: weather.aqi_lag_1,
            aqi_lag_3: weather.aqi_lag_3,
            temp_mean_7d_avg: weather.temp_mean_7d_avg,
            humidity_mean_7d_avg: weather.humidity_mean_7d_avg,
            temp_mean_squared: weather.temp_mean * weather.temp_mean,
        }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        let value = match column {
            TEMP_MEAN => self.temp_mean,
            TEMP_MAX_MEAN => self.temp_max_mean,
            TEMP_MIN_MEAN => self.temp_min_mean,
            WIND_SPEED_MEAN => self.wind_speed_mean,
            HUMIDITY_MEAN => self.humidity_mean,
            PRESSURE_MEAN => self.pressure_mean,
            CLOUDS_ALL_MEAN => self.clouds_all_mean,
            SEASON => self.season,
            DAY_OF_YEAR => self.day_of_year,
            DAY_OF_WEEK => self.day_of_week,
            IS_WEEKEND => self.is_weekend,
            AQI_LAG_1 => self.aqi_lag_1,
            AQI_LAG_3 => self.aqi_lag_3,
            TEMP_MEAN_7D_AVG => self.temp_mean_7d_avg,
            HUMIDITY_MEAN_7D_AVG => self.humidity_mean_7d_avg,
            TEMP_MEAN_SQUARED => self.temp_mean_squared,
            _ => return None,
        };
        Some(value)
    }

    /// Values in [`FEATURE_ORDER`].
    pub fn to_vec(&self) -> Vec<f64> {
        FEATURE_ORDER
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn weather(temp: f64) -> WeatherInputs {
        WeatherInputs {
            temp_mean: temp,
            temp_max_mean: temp + 5.0,
            temp_min_mean: temp - 5.0,
            wind_speed_mean: 3.0,
            humidity_mean: 40.0,
            pressure_mean: 1015.0,
            clouds_all_mean: 20.0,
            aqi_lag_1: 45.0,
            aqi_lag_3: 50.0,
            temp_mean_7d_avg: temp,
            humidity_mean_7d_avg: 41.0,
        }
    }

    #[test]
    fn test_vector_follows_feature_order() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 24).unwrap(); // Sunday
        let vector = FeatureVector::new(weather(4.0), CalendarFeatures::from_date(date));
        let values = vector.to_vec();

        assert_eq!(values.len(), FEATURE_ORDER.len());
        for (name, value) in FEATURE_ORDER.iter().zip(&values) {
            assert_eq!(vector.get(name), Some(*value), "column {}", name);
        }
        assert_eq!(vector.season, 1.0);
        assert_eq!(vector.is_weekend, 1.0);
        assert_eq!(vector.day_of_week, 6.0);
        assert_eq!(vector.temp_mean_squared, 16.0);
        assert!(vector.is_finite());
    }

    #[test]
    fn test_unknown_column() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let vector = FeatureVector::new(weather(20.0), CalendarFeatures::from_date(date));
        assert_eq!(vector.get("month"), None);
        assert_eq!(vector.get(AQI_VALUE), None);
    }
}
