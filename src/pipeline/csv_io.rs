//! CSV codec and typed column access shared by the pipeline stages.

use crate::pipeline::error::PipelineError;
use crate::types::calendar::{date_to_epoch_days, epoch_days_to_date};
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::Cursor;

/// Parses CSV bytes (with header) into a DataFrame.
///
/// Schema inference scans the whole file so a sentinel string late in a numeric
/// column turns the column into a string column instead of failing the read.
pub fn read_csv(bytes: Vec<u8>, path: &str) -> Result<DataFrame, PipelineError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| PipelineError::CsvRead {
            path: path.to_string(),
            source: e,
        })
}

pub fn write_csv(df: &mut DataFrame, dataset: &str) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(df)
        .map_err(|e| PipelineError::CsvWrite {
            dataset: dataset.to_string(),
            source: e,
        })?;
    Ok(buffer)
}

/// Removes leading/trailing whitespace from every column header.
pub fn strip_headers(df: &mut DataFrame) -> Result<(), PipelineError> {
    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(trimmed)?;
    Ok(())
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub fn require_column<'a>(
    df: &'a DataFrame,
    dataset: &str,
    column: &str,
) -> Result<&'a Column, PipelineError> {
    df.column(column)
        .map_err(|_| PipelineError::missing_column(dataset, column))
}

/// Reads a column as floats, coercing anything non-numeric to `None`.
///
/// String columns are parsed value by value (surrounding whitespace allowed);
/// `NaN`/infinite values are treated as missing as well.
pub fn coerce_f64(
    df: &DataFrame,
    dataset: &str,
    column: &str,
) -> Result<Vec<Option<f64>>, PipelineError> {
    let source = require_column(df, dataset, column)?;
    let values: Vec<Option<f64>> = if source.dtype() == &DataType::String {
        source
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect()
    } else {
        let casted = source.cast(&DataType::Float64)?;
        casted.f64()?.into_iter().collect()
    };
    Ok(values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Reads a column as strings, rendering non-string columns through a cast.
pub fn string_values(
    df: &DataFrame,
    dataset: &str,
    column: &str,
) -> Result<Vec<Option<String>>, PipelineError> {
    let source = require_column(df, dataset, column)?;
    let casted = source.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Reads a `Date` column (or a string column of dates) as `NaiveDate`s.
pub fn date_values(
    df: &DataFrame,
    dataset: &str,
    column: &str,
    parse: fn(&str) -> Option<NaiveDate>,
) -> Result<Vec<Option<NaiveDate>>, PipelineError> {
    let source = require_column(df, dataset, column)?;
    if source.dtype() == &DataType::Date {
        let physical = source.cast(&DataType::Int32)?;
        return Ok(physical
            .i32()?
            .into_iter()
            .map(|v| v.map(epoch_days_to_date))
            .collect());
    }
    Ok(string_values(df, dataset, column)?
        .into_iter()
        .map(|v| v.and_then(|s| parse(&s)))
        .collect())
}

pub fn date_column(name: &str, dates: &[NaiveDate]) -> Result<Column, PipelineError> {
    let days: Vec<i32> = dates.iter().map(|d| date_to_epoch_days(*d)).collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

pub fn optional_date_column(
    name: &str,
    dates: &[Option<NaiveDate>],
) -> Result<Column, PipelineError> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(date_to_epoch_days)).collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

/// Replaces a date column stored as text (as it comes back from CSV) by a real
/// `Date` column. Fails when the column is absent.
pub fn normalize_date_column(
    df: &mut DataFrame,
    dataset: &str,
    column: &str,
    parse: fn(&str) -> Option<NaiveDate>,
) -> Result<(), PipelineError> {
    let dates = date_values(df, dataset, column, parse)?;
    df.with_column(optional_date_column(column, &dates)?)?;
    Ok(())
}

pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name.into(), values)
}
