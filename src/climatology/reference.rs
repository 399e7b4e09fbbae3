//! In-memory historical record used for day-of-year lookups.

use crate::pipeline::canonical::CanonicalFrame;
use crate::pipeline::error::PipelineError;
use crate::types::columns::DATETIME;
use chrono::{Datelike, NaiveDate};
use log::info;
use std::collections::HashMap;

/// Column means over a set of historical rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeans {
    means: HashMap<String, f64>,
    /// Number of historical rows the means were computed over.
    pub rows: usize,
}

impl ColumnMeans {
    /// The mean of `column`, if the column exists and had a value in any row.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.means.get(column).copied()
    }
}

/// Numeric view of the canonical dataset, loaded once and read-only afterwards.
///
/// Every non-date column that holds at least one numeric value is kept;
/// text pass-through columns (site names and the like) are left out.
#[derive(Debug, Clone)]
pub struct HistoricalReference {
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<Option<f64>>)>,
    global: ColumnMeans,
}

impl HistoricalReference {
    pub fn from_canonical(canonical: &CanonicalFrame) -> Result<Self, PipelineError> {
        canonical.validate()?;
        let dates: Vec<NaiveDate> = canonical.dates()?.into_iter().flatten().collect();

        let mut columns = Vec::new();
        for name in canonical.frame.get_column_names() {
            if name.as_str() == DATETIME {
                continue;
            }
            let values = canonical.values(name)?;
            if values.iter().any(Option::is_some) {
                columns.push((name.to_string(), values));
            }
        }

        let global = means_over(&columns, 0..dates.len());
        info!(
            "Loaded historical reference: {} days, {} numeric columns",
            dates.len(),
            columns.len()
        );
        Ok(Self {
            dates,
            columns,
            global,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.iter().min().copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// Means over the whole record.
    pub fn global_means(&self) -> &ColumnMeans {
        &self.global
    }

    /// Means over every row, across all years, sharing `day_of_year`.
    /// `rows` is zero when no such row exists.
    pub fn day_of_year_means(&self, day_of_year: u32) -> ColumnMeans {
        let analogs = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, date)| date.ordinal() == day_of_year)
            .map(|(i, _)| i);
        means_over(&self.columns, analogs)
    }
}

fn means_over(
    columns: &[(String, Vec<Option<f64>>)],
    rows: impl Iterator<Item = usize>,
) -> ColumnMeans {
    let rows: Vec<usize> = rows.collect();
    let means = columns
        .iter()
        .filter_map(|(name, values)| {
            let present: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
            if present.is_empty() {
                return None;
            }
            Some((name.clone(), present.iter().sum::<f64>() / present.len() as f64))
        })
        .collect();
    ColumnMeans {
        means,
        rows: rows.len(),
    }
}
