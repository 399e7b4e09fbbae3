//! Daily resampling of sub-daily weather observations.

use crate::pipeline::csv_io::{
    coerce_f64, date_values, float_column, is_numeric, normalize_date_column,
    optional_date_column, read_csv, require_column, string_values, write_csv,
};
use crate::pipeline::error::PipelineError;
use crate::types::columns::{DailyStat, DATETIME};
use crate::types::timestamp::{parse_calendar_date, parse_timestamp};
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;

const DATASET: &str = "raw weather";
const SORT_KEY: &str = "__timestamp";

/// Resamples raw weather observations to one row per calendar day.
///
/// The timestamp of a raw row is the space-joined text of `timestamp_columns`:
/// `["dt_iso"]` for an OpenWeather bulk export, `["date", "time"]` for split
/// exports.
#[derive(Debug, Clone)]
pub struct WeatherResampler {
    timestamp_columns: Vec<String>,
}

impl Default for WeatherResampler {
    fn default() -> Self {
        Self::new(vec!["dt_iso".to_string()])
    }
}

impl WeatherResampler {
    pub fn new(timestamp_columns: Vec<String>) -> Self {
        Self { timestamp_columns }
    }

    /// Resamples raw observations into daily `{var}_{stat}` aggregates.
    ///
    /// Rows are put in chronological order and forward-filled before grouping,
    /// so an outage is aggregated as repetitions of the last reading. Days
    /// without a single observation do not appear in the output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Schema`] when a timestamp column is absent or
    /// no row carries a parsable timestamp.
    pub fn resample(&self, raw: &DataFrame) -> Result<DailyWeatherFrame, PipelineError> {
        if self.timestamp_columns.is_empty() {
            return Err(PipelineError::schema(DATASET, "no timestamp column configured"));
        }
        for column in &self.timestamp_columns {
            require_column(raw, DATASET, column).map_err(|_| {
                PipelineError::schema(DATASET, format!("timestamp column '{}' not found", column))
            })?;
        }

        let timestamps = self.parse_timestamps(raw)?;
        let valid = timestamps.iter().filter(|t| t.is_some()).count();
        if valid == 0 {
            return Err(PipelineError::schema(
                DATASET,
                format!(
                    "none of the {} rows has a parsable timestamp in {:?}",
                    raw.height(),
                    self.timestamp_columns
                ),
            ));
        }
        if valid < raw.height() {
            debug!(
                "Dropping {} weather rows with unparsable timestamps",
                raw.height() - valid
            );
        }

        let variables: Vec<String> = raw
            .get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| c.name().to_string())
            .filter(|name| !self.timestamp_columns.contains(name))
            .collect();

        let days: Vec<Option<NaiveDate>> = timestamps.iter().map(|t| t.map(|dt| dt.date())).collect();
        let sort_key: Vec<Option<i64>> = timestamps
            .iter()
            .map(|t| t.map(|dt| dt.and_utc().timestamp()))
            .collect();

        let mut columns = vec![
            Column::new(SORT_KEY.into(), sort_key),
            optional_date_column(DATETIME, &days)?,
        ];
        for variable in &variables {
            columns.push(float_column(variable, coerce_f64(raw, DATASET, variable)?));
        }

        let chronological = DataFrame::new(columns)?
            .lazy()
            .filter(col(SORT_KEY).is_not_null())
            .sort([SORT_KEY], SortMultipleOptions::default().with_maintain_order(true))
            .collect()?;
        let filled = chronological.fill_null(FillNullStrategy::Forward(None))?;

        let mut aggregations = Vec::with_capacity(variables.len() * DailyStat::ALL.len());
        for stat in DailyStat::ALL {
            for variable in &variables {
                aggregations.push(stat_expr(stat, variable));
            }
        }

        let frame = filled
            .lazy()
            .group_by([col(DATETIME)])
            .agg(aggregations)
            .sort([DATETIME], SortMultipleOptions::default())
            .collect()?;

        info!(
            "Resampled {} weather observations into {} days over {} variables",
            valid,
            frame.height(),
            variables.len()
        );
        Ok(DailyWeatherFrame { frame })
    }

    fn parse_timestamps(
        &self,
        raw: &DataFrame,
    ) -> Result<Vec<Option<chrono::NaiveDateTime>>, PipelineError> {
        let parts = self
            .timestamp_columns
            .iter()
            .map(|c| string_values(raw, DATASET, c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..raw.height())
            .map(|row| {
                let pieces: Option<Vec<&str>> = parts
                    .iter()
                    .map(|column| column[row].as_deref())
                    .collect();
                pieces.and_then(|p| parse_timestamp(&p.join(" ")))
            })
            .collect())
    }
}

fn stat_expr(stat: DailyStat, variable: &str) -> Expr {
    let source = col(variable);
    let aggregated = match stat {
        DailyStat::Mean => source.mean(),
        DailyStat::Max => source.max(),
        DailyStat::Min => source.min(),
        DailyStat::Std => source.std(0),
    };
    aggregated.alias(stat.column_name(variable))
}

/// Daily weather aggregates: a `datetime` date column followed by
/// `{var}_{stat}` columns, one row per observed day, sorted by date.
#[derive(Debug, Clone)]
pub struct DailyWeatherFrame {
    pub frame: DataFrame,
}

impl DailyWeatherFrame {
    /// Loads a previously written daily weather CSV.
    pub fn from_csv(bytes: Vec<u8>, path: &str) -> Result<Self, PipelineError> {
        let mut frame = read_csv(bytes, path)?;
        normalize_date_column(&mut frame, "daily weather", DATETIME, parse_calendar_date)?;
        Ok(Self { frame })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, PipelineError> {
        write_csv(&mut self.frame.clone(), "daily weather")
    }

    pub fn dates(&self) -> Result<Vec<Option<NaiveDate>>, PipelineError> {
        date_values(&self.frame, "daily weather", DATETIME, parse_calendar_date)
    }

    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
        coerce_f64(&self.frame, "daily weather", column)
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}
