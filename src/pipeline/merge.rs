//! Outer join of daily weather and AQI on the calendar date.

use crate::pipeline::aqi::AqiFrame;
use crate::pipeline::canonical::CanonicalFrame;
use crate::pipeline::csv_io::{normalize_date_column, require_column};
use crate::pipeline::error::PipelineError;
use crate::pipeline::resample::DailyWeatherFrame;
use crate::types::columns::{AQI_DATE, DATETIME};
use crate::types::timestamp::parse_calendar_date;
use log::{info, warn};
use polars::prelude::*;
use std::collections::HashSet;

/// Builds the canonical daily dataset.
///
/// The result holds every date of either input exactly once per matching
/// pair, sorted ascending. Each column is then forward-filled on its own, so a
/// day present in only one source inherits the other source's values from the
/// nearest earlier day. Nothing is filled backward: leading rows keep their
/// gaps when one source starts later than the other.
pub fn merge_weather_and_aqi(
    weather: &DailyWeatherFrame,
    aqi: &AqiFrame,
) -> Result<CanonicalFrame, PipelineError> {
    let mut weather_frame = weather.frame.clone();
    let mut aqi_frame = aqi.frame.clone();
    require_column(&weather_frame, "daily weather", DATETIME)?;
    require_column(&aqi_frame, "combined AQI", AQI_DATE)?;
    normalize_date_column(&mut weather_frame, "daily weather", DATETIME, parse_calendar_date)?;
    normalize_date_column(&mut aqi_frame, "combined AQI", AQI_DATE, parse_calendar_date)?;

    let joined = weather_frame
        .lazy()
        .join(
            aqi_frame.lazy(),
            [col(DATETIME)],
            [col(AQI_DATE)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .sort([DATETIME], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;

    let frame = joined.fill_null(FillNullStrategy::Forward(None))?;
    let canonical = CanonicalFrame::new(frame);

    let dates = canonical.dates()?;
    let distinct: HashSet<_> = dates.iter().flatten().collect();
    if distinct.len() < dates.len() {
        warn!(
            "Merged dataset repeats dates: {} rows for {} distinct days",
            dates.len(),
            distinct.len()
        );
    }
    info!(
        "Merged {} weather days and {} AQI rows into {} daily records",
        weather.height(),
        aqi.height(),
        canonical.height()
    );
    Ok(canonical)
}
