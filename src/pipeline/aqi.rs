//! Combination of per-period AQI exports into one chronological series.

use crate::pipeline::csv_io::{
    date_values, is_numeric, normalize_date_column, optional_date_column, read_csv,
    require_column, strip_headers, write_csv,
};
use crate::pipeline::error::PipelineError;
use crate::types::columns::{AQI_DATE, AQI_VALUE};
use crate::types::timestamp::parse_calendar_date;
use chrono::NaiveDate;
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::HashSet;

const DATASET: &str = "raw AQI";

/// Combined AQI observations sorted ascending by the `Date` column.
///
/// Besides `Date` and `AQI Value` every column of the source files (site name,
/// pollutant, ...) is carried along untouched. `AQI Value` keeps its raw form
/// here; sentinel strings are only coerced to missing during feature derivation.
#[derive(Debug, Clone)]
pub struct AqiFrame {
    pub frame: DataFrame,
}

impl AqiFrame {
    pub fn from_csv(bytes: Vec<u8>, path: &str) -> Result<Self, PipelineError> {
        let mut frame = read_csv(bytes, path)?;
        normalize_date_column(&mut frame, "combined AQI", AQI_DATE, parse_calendar_date)?;
        Ok(Self { frame })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, PipelineError> {
        write_csv(&mut self.frame.clone(), "combined AQI")
    }

    pub fn dates(&self) -> Result<Vec<Option<NaiveDate>>, PipelineError> {
        date_values(&self.frame, "combined AQI", AQI_DATE, parse_calendar_date)
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AqiCombiner;

impl AqiCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Parses and combines raw AQI CSV files given as `(path, bytes)` pairs.
    pub fn combine_csv(&self, files: Vec<(String, Vec<u8>)>) -> Result<AqiFrame, PipelineError> {
        let frames = files
            .into_iter()
            .map(|(path, bytes)| read_csv(bytes, &path).map(|df| (path, df)))
            .collect::<Result<Vec<_>, _>>()?;
        self.combine(frames)
    }

    /// Normalizes every source, concatenates them and sorts by date.
    ///
    /// Rows whose date cannot be parsed are dropped. Dates repeated across
    /// overlapping sources are kept as they are.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoInputs`] for an empty source list, a schema error when a
    /// source lacks the `Date` column.
    pub fn combine(&self, sources: Vec<(String, DataFrame)>) -> Result<AqiFrame, PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::NoInputs(DATASET.to_string()));
        }

        let mut normalized = Vec::with_capacity(sources.len());
        for (path, df) in sources {
            normalized.push(normalize_source(&path, df)?);
        }

        let combined = concat_aligned(normalized)?;
        let frame = combined
            .lazy()
            .sort([AQI_DATE], SortMultipleOptions::default().with_maintain_order(true))
            .collect()?;

        let aqi_frame = AqiFrame { frame };
        let dates = aqi_frame.dates()?;
        let distinct: HashSet<_> = dates.iter().flatten().collect();
        if distinct.len() < dates.len() {
            warn!(
                "Combined AQI series holds {} rows for {} distinct dates; duplicates are kept",
                dates.len(),
                distinct.len()
            );
        }
        info!("Combined {} AQI observations", aqi_frame.height());
        Ok(aqi_frame)
    }
}

fn normalize_source(path: &str, mut df: DataFrame) -> Result<DataFrame, PipelineError> {
    strip_headers(&mut df)?;
    let dataset = format!("{} file '{}'", DATASET, path);
    require_column(&df, &dataset, AQI_DATE)?;
    if require_column(&df, &dataset, AQI_VALUE).is_err() {
        debug!("{} has no '{}' column", dataset, AQI_VALUE);
    }

    let dates = date_values(&df, &dataset, AQI_DATE, parse_calendar_date)?;
    let dropped = dates.iter().filter(|d| d.is_none()).count();
    df.with_column(optional_date_column(AQI_DATE, &dates)?)?;
    if dropped > 0 {
        debug!("Dropping {} rows with unparsable dates from {}", dropped, dataset);
    }

    Ok(df.lazy().filter(col(AQI_DATE).is_not_null()).collect()?)
}

/// Stacks frames whose column sets may differ, taking columns in order of
/// first appearance and filling absent ones with nulls. A column whose type
/// differs between frames is widened to `Float64` when every variant is
/// numeric, and to `String` otherwise.
fn concat_aligned(frames: Vec<DataFrame>) -> Result<DataFrame, PipelineError> {
    let mut names: Vec<PlSmallStr> = Vec::new();
    for df in &frames {
        for name in df.get_column_names() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    let dtypes: Vec<DataType> = names
        .iter()
        .map(|name| {
            let seen: Vec<&DataType> = frames
                .iter()
                .filter_map(|df| df.column(name).ok().map(|c| c.dtype()))
                .collect();
            unify_dtype(&seen)
        })
        .collect();

    let mut combined: Option<DataFrame> = None;
    for df in frames {
        let height = df.height();
        let columns = names
            .iter()
            .zip(&dtypes)
            .map(|(name, dtype)| match df.column(name) {
                Ok(column) => column.cast(dtype),
                Err(_) => Ok(Column::full_null(name.clone(), height, dtype)),
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        let aligned = DataFrame::new(columns)?;
        combined = Some(match combined {
            Some(mut acc) => {
                acc.vstack_mut(&aligned)?;
                acc
            }
            None => aligned,
        });
    }
    combined.ok_or_else(|| PipelineError::NoInputs(DATASET.to_string()))
}

fn unify_dtype(seen: &[&DataType]) -> DataType {
    match seen {
        [] => DataType::Null,
        [first, rest @ ..] if rest.iter().all(|d| d == first) => (*first).clone(),
        _ if seen.iter().all(|d| is_numeric(d)) => DataType::Float64,
        _ => DataType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::csv_io::{coerce_f64, string_values};

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn file(path: &str, csv: &str) -> (String, Vec<u8>) {
        (path.to_string(), csv.as_bytes().to_vec())
    }

    #[test]
    fn test_combine_sorts_and_drops_bad_dates() -> Result<(), Box<dyn std::error::Error>> {
        let combined = AqiCombiner::new().combine_csv(vec![
            file(
                "denver_aqi_2021.csv",
                "Date , AQI Value ,Site Name\n01/02/2021,40,Welby\nnot a date,99,Welby\n",
            ),
            file(
                "denver_aqi_2020.csv",
                "Date,AQI Value,Site Name\n12/31/2020,35,Welby\n12/30/2020,N/A,Welby\n",
            ),
        ])?;

        assert_eq!(
            combined.dates()?,
            vec![d(2020, 12, 30), d(2020, 12, 31), d(2021, 1, 2)]
        );
        // the sentinel survives as text until feature derivation
        assert_eq!(
            string_values(&combined.frame, "test", AQI_VALUE)?[0].as_deref(),
            Some("N/A")
        );
        assert_eq!(
            coerce_f64(&combined.frame, "test", AQI_VALUE)?,
            vec![None, Some(35.0), Some(40.0)]
        );
        assert_eq!(
            string_values(&combined.frame, "test", "Site Name")?,
            vec![Some("Welby".to_string()); 3]
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_dates_are_kept() -> Result<(), Box<dyn std::error::Error>> {
        let combined = AqiCombiner::new().combine_csv(vec![
            file("a.csv", "Date,AQI Value\n2022-06-01,50\n2022-06-02,51\n"),
            file("b.csv", "Date,AQI Value,Pollutant\n2022-06-02,60,Ozone\n"),
        ])?;
        assert_eq!(combined.height(), 3);
        assert_eq!(
            combined.dates()?,
            vec![d(2022, 6, 1), d(2022, 6, 2), d(2022, 6, 2)]
        );
        assert_eq!(
            string_values(&combined.frame, "test", "Pollutant")?,
            vec![None, None, Some("Ozone".to_string())]
        );
        Ok(())
    }

    #[test]
    fn test_missing_date_column() {
        let err = AqiCombiner::new()
            .combine_csv(vec![file("bad.csv", "Day,AQI Value\n2022-06-01,50\n")])
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_no_inputs() {
        let err = AqiCombiner::new().combine(Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::NoInputs(_)));
    }

    #[test]
    fn test_csv_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let combined = AqiCombiner::new()
            .combine_csv(vec![file("a.csv", "Date,AQI Value\n03/01/2019,12\n02/28/2019,30\n")])?;
        let reloaded = AqiFrame::from_csv(combined.to_csv()?, "combined.csv")?;
        assert_eq!(reloaded.dates()?, vec![d(2019, 2, 28), d(2019, 3, 1)]);
        Ok(())
    }
}
