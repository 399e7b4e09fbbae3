//! Derivation of model features from the canonical daily dataset.

use crate::model::FeatureMatrix;
use crate::pipeline::canonical::CanonicalFrame;
use crate::pipeline::csv_io::{date_column, float_column, write_csv};
use crate::pipeline::error::PipelineError;
use crate::types::calendar::CalendarFeatures;
use crate::types::columns::*;
use crate::types::feature_vector::{FeatureVector, WeatherInputs};
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;

/// Trailing window, in rows, of the rolling temperature and humidity means.
pub const ROLLING_WINDOW: usize = 7;
/// Fewest complete rows a training run needs.
pub const MIN_TRAINING_ROWS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub target: f64,
}

/// Feature rows paired with their AQI target, in chronological order.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.target).collect()
    }

    /// The rows with every feature present.
    pub fn complete(&self) -> FeatureTable {
        FeatureTable {
            rows: self
                .rows
                .iter()
                .filter(|r| r.features.is_finite())
                .cloned()
                .collect(),
        }
    }

    pub fn matrix(&self) -> FeatureMatrix {
        FeatureMatrix::new(
            FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            self.rows.iter().map(|r| r.features.to_vec()).collect(),
        )
    }

    /// `datetime`, the features in [`FEATURE_ORDER`], then `AQI Value`.
    /// Missing features are written as nulls.
    pub fn to_frame(&self) -> Result<DataFrame, PipelineError> {
        let dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        let mut columns = vec![date_column(DATETIME, &dates)?];
        for name in FEATURE_ORDER {
            let values = self.rows.iter().map(|r| r.features.get(name)).collect();
            columns.push(float_column(name, values));
        }
        columns.push(float_column(
            AQI_VALUE,
            self.rows.iter().map(|r| Some(r.target)).collect(),
        ));
        Ok(DataFrame::new(columns)?)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, PipelineError> {
        write_csv(&mut self.to_frame()?, "features")
    }
}

/// Derives calendar, lag, rolling and squared-temperature features.
///
/// The dataset is put in ascending date order first. Lags and rolling means
/// are positional: `AQI_lag_1` is the AQI of the previous row whatever its
/// date, and the rolling means cover the current row plus the six rows before
/// it, requiring all seven values. Rows lacking the AQI target, the rolling
/// temperature mean or `AQI_lag_1` are dropped, which removes at least the
/// first six rows. Any other missing feature is kept as NaN.
pub fn derive_features(canonical: &CanonicalFrame) -> Result<FeatureTable, PipelineError> {
    canonical.validate()?;
    let sorted = CanonicalFrame::new(
        canonical
            .frame
            .clone()
            .lazy()
            .sort([DATETIME], SortMultipleOptions::default().with_maintain_order(true))
            .collect()?,
    );

    let dates = sorted.dates()?;
    let aqi = sorted.values(AQI_VALUE)?;
    let weather: Vec<Vec<Option<f64>>> = WEATHER_FEATURES
        .iter()
        .map(|c| sorted.values(c))
        .collect::<Result<_, _>>()?;
    let temp = weather[0].as_slice();
    let humidity = weather[4].as_slice();

    let lag = |i: usize, n: usize| if i >= n { aqi[i - n] } else { None };
    let rolling = |series: &[Option<f64>], i: usize| -> Option<f64> {
        if i + 1 < ROLLING_WINDOW {
            return None;
        }
        let window = &series[i + 1 - ROLLING_WINDOW..=i];
        let sum = window.iter().copied().sum::<Option<f64>>()?;
        Some(sum / ROLLING_WINDOW as f64)
    };

    let mut rows = Vec::new();
    for (i, date) in dates.iter().enumerate() {
        let (target, temp_7d, lag_1) = (aqi[i], rolling(temp, i), lag(i, 1));
        let (Some(date), Some(target), Some(temp_mean_7d_avg), Some(aqi_lag_1)) =
            (date, target, temp_7d, lag_1)
        else {
            continue;
        };
        let value = |v: Option<f64>| v.unwrap_or(f64::NAN);
        let inputs = WeatherInputs {
            temp_mean: value(weather[0][i]),
            temp_max_mean: value(weather[1][i]),
            temp_min_mean: value(weather[2][i]),
            wind_speed_mean: value(weather[3][i]),
            humidity_mean: value(weather[4][i]),
            pressure_mean: value(weather[5][i]),
            clouds_all_mean: value(weather[6][i]),
            aqi_lag_1,
            aqi_lag_3: value(lag(i, 3)),
            temp_mean_7d_avg,
            humidity_mean_7d_avg: value(rolling(humidity, i)),
        };
        rows.push(FeatureRow {
            date: *date,
            features: FeatureVector::new(inputs, CalendarFeatures::from_date(*date)),
            target,
        });
    }

    info!(
        "Derived {} feature rows from {} daily records",
        rows.len(),
        sorted.height()
    );
    Ok(FeatureTable { rows })
}

/// The complete rows of `table`, provided there are at least `min_rows`.
pub fn training_rows(table: &FeatureTable, min_rows: usize) -> Result<FeatureTable, PipelineError> {
    let complete = table.complete();
    let dropped = table.len() - complete.len();
    if dropped > 0 {
        debug!("Dropped {} feature rows with missing inputs before training", dropped);
    }
    if complete.len() < min_rows {
        return Err(PipelineError::InsufficientHistory {
            found: complete.len(),
            required: min_rows,
        });
    }
    Ok(complete)
}

/// Derives features and keeps the complete rows for training.
pub fn derive_training_set(
    canonical: &CanonicalFrame,
    min_rows: usize,
) -> Result<FeatureTable, PipelineError> {
    training_rows(&derive_features(canonical)?, min_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::canonical::tests::synthetic;
    use crate::pipeline::csv_io::{read_csv, string_values};
    use chrono::{Datelike, Duration};
    use proptest::prelude::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_ten_rows_keep_rows_seven_to_ten() -> Result<(), Box<dyn std::error::Error>> {
        let table = derive_features(&synthetic(start(), 10))?;
        let dates: Vec<NaiveDate> = table.rows.iter().map(|r| r.date).collect();
        let expected: Vec<NaiveDate> = (6..10).map(|i| start() + Duration::days(i)).collect();
        assert_eq!(dates, expected);
        Ok(())
    }

    #[test]
    fn test_feature_values() -> Result<(), Box<dyn std::error::Error>> {
        let table = derive_features(&synthetic(start(), 10))?;
        let first = &table.rows[0];
        // synthetic AQI is 30 + 3 * i, temp 5 + i, humidity 40 + 0.5 * i
        assert_eq!(first.target, 48.0);
        assert_eq!(first.features.aqi_lag_1, 45.0);
        assert_eq!(first.features.aqi_lag_3, 39.0);
        assert_eq!(first.features.temp_mean_7d_avg, 8.0);
        assert_eq!(first.features.humidity_mean_7d_avg, 41.5);
        assert_eq!(first.features.temp_mean_squared, 121.0);
        // 2024-01-07 is a Sunday
        assert_eq!(first.features.day_of_week, 6.0);
        assert_eq!(first.features.is_weekend, 1.0);
        assert_eq!(first.features.day_of_year, 7.0);
        assert_eq!(first.features.season, 1.0);
        Ok(())
    }

    #[test]
    fn test_sentinel_aqi_is_missing_and_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let mut csv = String::from(
            "datetime,temp_mean,temp_max_mean,temp_min_mean,wind_speed_mean,humidity_mean,pressure_mean,clouds_all_mean,AQI Value\n",
        );
        for i in 0..12 {
            let aqi = if i == 9 { "N/A".to_string() } else { (40 + i).to_string() };
            csv.push_str(&format!("2024-03-{:02},{i},{i},{i},1,30,1000,10,{aqi}\n", i + 1));
        }
        let canonical = CanonicalFrame::from_csv(csv.into_bytes(), "merged.csv")?;
        let table = derive_features(&canonical)?;

        let days: Vec<u32> = table.rows.iter().map(|r| r.date.day()).collect();
        // row 10 loses its target, row 11 loses its lag
        assert_eq!(days, vec![7, 8, 9, 12]);
        assert!(table.rows.iter().all(|r| r.features.aqi_lag_1.is_finite()));
        Ok(())
    }

    fn march_with_missing_aqi(days: usize, missing: usize) -> Result<CanonicalFrame, PipelineError> {
        let mut csv = String::from(
            "datetime,temp_mean,temp_max_mean,temp_min_mean,wind_speed_mean,humidity_mean,pressure_mean,clouds_all_mean,AQI Value\n",
        );
        for i in 0..days {
            let aqi = if i == missing { "N/A".to_string() } else { (40 + i).to_string() };
            csv.push_str(&format!("2024-03-{:02},{i},{i},{i},1,30,1000,10,{aqi}\n", i + 1));
        }
        CanonicalFrame::from_csv(csv.into_bytes(), "merged.csv")
    }

    #[test]
    fn test_missing_lag_three_keeps_the_row() -> Result<(), Box<dyn std::error::Error>> {
        let table = derive_features(&march_with_missing_aqi(14, 8)?)?;
        let days: Vec<u32> = table.rows.iter().map(|r| r.date.day()).collect();
        assert_eq!(days, vec![7, 8, 11, 12, 13, 14]);

        let twelfth = &table.rows[3];
        assert_eq!(twelfth.target, 51.0);
        assert_eq!(twelfth.features.aqi_lag_1, 50.0);
        assert!(twelfth.features.aqi_lag_3.is_nan());
        assert!(!twelfth.features.is_finite());

        let frame = read_csv(table.to_csv()?, "features.csv")?;
        assert_eq!(frame.height(), 6);
        assert_eq!(frame.column(AQI_LAG_3)?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_training_rows_skip_incomplete_features() -> Result<(), Box<dyn std::error::Error>> {
        let table = derive_features(&march_with_missing_aqi(14, 8)?)?;
        let training = training_rows(&table, 5)?;
        let days: Vec<u32> = training.rows.iter().map(|r| r.date.day()).collect();
        assert_eq!(days, vec![7, 8, 11, 13, 14]);
        assert!(training.matrix().check().is_ok());

        let err = training_rows(&table, 6).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory { found: 5, required: 6 }
        ));
        Ok(())
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() -> Result<(), Box<dyn std::error::Error>> {
        let canonical = synthetic(start(), 9);
        let reversed = CanonicalFrame::new(canonical.frame.reverse());
        let a = derive_features(&canonical)?;
        let b = derive_features(&reversed)?;
        assert_eq!(a.rows, b.rows);
        Ok(())
    }

    #[test]
    fn test_training_set_requires_eight_rows() {
        let err = derive_training_set(&synthetic(start(), 10), MIN_TRAINING_ROWS).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory { found: 4, required: 8 }
        ));
        assert!(derive_training_set(&synthetic(start(), 14), MIN_TRAINING_ROWS).is_ok());
    }

    #[test]
    fn test_feature_csv_layout() -> Result<(), Box<dyn std::error::Error>> {
        let table = derive_features(&synthetic(start(), 8))?;
        let frame = read_csv(table.to_csv()?, "features.csv")?;
        let names: Vec<String> = frame.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some(DATETIME));
        assert_eq!(names.last().map(String::as_str), Some(AQI_VALUE));
        assert_eq!(&names[1..17], FEATURE_ORDER.map(String::from).as_slice());
        assert_eq!(
            string_values(&frame, "features", DATETIME)?,
            vec![Some("2024-01-07".to_string()), Some("2024-01-08".to_string())]
        );
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_lag_one_always_present(days in 2usize..40, gap in 0usize..40) {
            let mut canonical = synthetic(start(), days);
            if gap < days {
                let mut aqi = canonical.values(AQI_VALUE).unwrap();
                aqi[gap] = None;
                canonical.frame.with_column(float_column(AQI_VALUE, aqi)).unwrap();
            }
            let table = derive_features(&canonical).unwrap();
            prop_assert!(table.len() <= days.saturating_sub(ROLLING_WINDOW - 1));
            for row in &table.rows {
                prop_assert!(row.target.is_finite());
                prop_assert!(row.features.aqi_lag_1.is_finite());
                prop_assert!(row.features.temp_mean_7d_avg.is_finite());
            }
            prop_assert!(table.complete().rows.iter().all(|r| r.features.is_finite()));
        }
    }
}
