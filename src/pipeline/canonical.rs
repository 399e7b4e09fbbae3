//! The canonical daily dataset shared by training, climatology and serving.

use crate::pipeline::csv_io::{
    coerce_f64, date_values, normalize_date_column, read_csv, require_column, write_csv,
};
use crate::pipeline::error::PipelineError;
use crate::types::columns::{CANONICAL_REQUIRED, DATETIME};
use crate::types::timestamp::parse_calendar_date;
use chrono::NaiveDate;
use polars::prelude::*;

const DATASET: &str = "canonical dataset";

/// One row per date in the union of the weather and AQI sources, sorted
/// ascending by `datetime` and forward-filled column by column.
///
/// Columns: `datetime`, the `{var}_{stat}` weather aggregates, `AQI Value` and
/// whatever pass-through columns the AQI files carried.
#[derive(Debug, Clone)]
pub struct CanonicalFrame {
    pub frame: DataFrame,
}

impl CanonicalFrame {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Loads the canonical CSV, turning the `datetime` column back into dates.
    pub fn from_csv(bytes: Vec<u8>, path: &str) -> Result<Self, PipelineError> {
        let mut frame = read_csv(bytes, path)?;
        normalize_date_column(&mut frame, DATASET, DATETIME, parse_calendar_date)?;
        Ok(Self { frame })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, PipelineError> {
        write_csv(&mut self.frame.clone(), DATASET)
    }

    /// Checks the columns every consumer of the canonical dataset relies on.
    ///
    /// Each required column must exist, `datetime` must be fully parsable, and
    /// every required value column must hold at least one numeric value.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for column in CANONICAL_REQUIRED {
            require_column(&self.frame, DATASET, column)?;
        }

        let dates = self.dates()?;
        let unparsable = dates.iter().filter(|d| d.is_none()).count();
        if unparsable > 0 {
            return Err(PipelineError::schema(
                DATASET,
                format!("{} rows have no parsable '{}'", unparsable, DATETIME),
            ));
        }

        for column in CANONICAL_REQUIRED.iter().filter(|c| **c != DATETIME) {
            if self.values(column)?.iter().all(Option::is_none) {
                return Err(PipelineError::schema(
                    DATASET,
                    format!("column '{}' holds no numeric value", column),
                ));
            }
        }
        Ok(())
    }

    pub fn dates(&self) -> Result<Vec<Option<NaiveDate>>, PipelineError> {
        date_values(&self.frame, DATASET, DATETIME, parse_calendar_date)
    }

    /// Values of `column` as floats; non-numeric entries come back as `None`.
    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
        coerce_f64(&self.frame, DATASET, column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.column(column).is_ok()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::csv_io::{date_column, float_column};
    use crate::types::columns::*;
    use chrono::Duration;

    /// A synthetic canonical dataset of `days` consecutive days starting at
    /// `start`, with smoothly varying weather and AQI values.
    pub(crate) fn synthetic(start: NaiveDate, days: usize) -> CanonicalFrame {
        let dates: Vec<NaiveDate> = (0..days)
            .map(|i| start + Duration::days(i as i64))
            .collect();
        let series = |offset: f64, scale: f64| -> Vec<Option<f64>> {
            (0..days)
                .map(|i| Some(offset + scale * ((i % 17) as f64)))
                .collect()
        };
        let frame = DataFrame::new(vec![
            date_column(DATETIME, &dates).unwrap(),
            float_column(TEMP_MEAN, series(5.0, 1.0)),
            float_column(TEMP_MAX_MEAN, series(10.0, 1.0)),
            float_column(TEMP_MIN_MEAN, series(0.0, 1.0)),
            float_column(WIND_SPEED_MEAN, series(3.0, 0.1)),
            float_column(HUMIDITY_MEAN, series(40.0, 0.5)),
            float_column(PRESSURE_MEAN, series(1010.0, 0.2)),
            float_column(CLOUDS_ALL_MEAN, series(20.0, 2.0)),
            float_column(AQI_VALUE, series(30.0, 3.0)),
        ])
        .unwrap();
        CanonicalFrame::new(frame)
    }

    #[test]
    fn test_validate_accepts_complete_dataset() {
        let canonical = synthetic(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10);
        assert!(canonical.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_column() {
        let mut canonical = synthetic(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 3);
        canonical.frame = canonical.frame.drop(PRESSURE_MEAN).unwrap();
        let err = canonical.validate().unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains(PRESSURE_MEAN));
    }

    #[test]
    fn test_validate_rejects_non_numeric_column() -> Result<(), Box<dyn std::error::Error>> {
        let csv = "datetime,temp_mean,temp_max_mean,temp_min_mean,wind_speed_mean,humidity_mean,pressure_mean,clouds_all_mean,AQI Value\n\
                   2024-01-01,1,2,0,3,40,1010,20,N/A\n";
        let canonical = CanonicalFrame::from_csv(csv.as_bytes().to_vec(), "merged.csv")?;
        let err = canonical.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        Ok(())
    }

    #[test]
    fn test_csv_round_trip_preserves_values_and_order() -> Result<(), Box<dyn std::error::Error>> {
        let canonical = synthetic(NaiveDate::from_ymd_opt(2023, 12, 25).unwrap(), 12);
        let reloaded = CanonicalFrame::from_csv(canonical.to_csv()?, "merged.csv")?;

        assert_eq!(reloaded.dates()?, canonical.dates()?);
        for column in CANONICAL_REQUIRED.iter().filter(|c| **c != DATETIME) {
            let before = canonical.values(column)?;
            let after = reloaded.values(column)?;
            assert_eq!(before.len(), after.len());
            for (a, b) in before.iter().zip(&after) {
                let (a, b) = (a.unwrap(), b.unwrap());
                assert!((a - b).abs() < 1e-9, "{column}: {a} != {b}");
            }
        }
        reloaded.validate()?;
        Ok(())
    }
}
