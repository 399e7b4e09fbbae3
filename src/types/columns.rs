//! Column names shared by every pipeline stage and the canonical CSV schema.

use std::fmt;

/// Date column of the daily weather aggregates and of the canonical dataset.
pub const DATETIME: &str = "datetime";
/// Date column of the raw AQI files.
pub const AQI_DATE: &str = "Date";
/// AQI target column.
pub const AQI_VALUE: &str = "AQI Value";

pub const TEMP_MEAN: &str = "temp_mean";
pub const TEMP_MAX_MEAN: &str = "temp_max_mean";
pub const TEMP_MIN_MEAN: &str = "temp_min_mean";
pub const WIND_SPEED_MEAN: &str = "wind_speed_mean";
pub const HUMIDITY_MEAN: &str = "humidity_mean";
pub const PRESSURE_MEAN: &str = "pressure_mean";
pub const CLOUDS_ALL_MEAN: &str = "clouds_all_mean";

pub const SEASON: &str = "season";
pub const DAY_OF_YEAR: &str = "day_of_year";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_WEEKEND: &str = "is_weekend";
pub const AQI_LAG_1: &str = "AQI_lag_1";
pub const AQI_LAG_3: &str = "AQI_lag_3";
pub const TEMP_MEAN_7D_AVG: &str = "temp_mean_7d_avg";
pub const HUMIDITY_MEAN_7D_AVG: &str = "humidity_mean_7d_avg";
pub const TEMP_MEAN_SQUARED: &str = "temp_mean_squared";

/// Daily weather means consumed directly as model features.
pub const WEATHER_FEATURES: [&str; 7] = [
    TEMP_MEAN,
    TEMP_MAX_MEAN,
    TEMP_MIN_MEAN,
    WIND_SPEED_MEAN,
    HUMIDITY_MEAN,
    PRESSURE_MEAN,
    CLOUDS_ALL_MEAN,
];

/// The model input columns, in the order the trainer emits them.
pub const FEATURE_ORDER: [&str; 16] = [
    TEMP_MEAN,
    TEMP_MAX_MEAN,
    TEMP_MIN_MEAN,
    WIND_SPEED_MEAN,
    HUMIDITY_MEAN,
    PRESSURE_MEAN,
    CLOUDS_ALL_MEAN,
    SEASON,
    DAY_OF_YEAR,
    DAY_OF_WEEK,
    IS_WEEKEND,
    AQI_LAG_1,
    AQI_LAG_3,
    TEMP_MEAN_7D_AVG,
    HUMIDITY_MEAN_7D_AVG,
    TEMP_MEAN_SQUARED,
];

/// Columns the canonical dataset must carry for training and climatology.
pub const CANONICAL_REQUIRED: [&str; 9] = [
    DATETIME,
    AQI_VALUE,
    TEMP_MEAN,
    TEMP_MAX_MEAN,
    TEMP_MIN_MEAN,
    WIND_SPEED_MEAN,
    HUMIDITY_MEAN,
    PRESSURE_MEAN,
    CLOUDS_ALL_MEAN,
];

/// Per-day statistic computed by the weather resampler.
///
/// The declaration order is the order in which the aggregate column groups
/// appear in the resampled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DailyStat {
    Mean,
    Max,
    Min,
    /// Population standard deviation (ddof = 0).
    Std,
}

impl DailyStat {
    pub const ALL: [DailyStat; 4] = [DailyStat::Mean, DailyStat::Max, DailyStat::Min, DailyStat::Std];

    pub fn suffix(&self) -> &'static str {
        match self {
            DailyStat::Mean => "mean",
            DailyStat::Max => "max",
            DailyStat::Min => "min",
            DailyStat::Std => "std",
        }
    }

    /// Name of the aggregate column for `variable`, e.g. `temp_max` + `Mean` = `temp_max_mean`.
    pub fn column_name(&self, variable: &str) -> String {
        format!("{}_{}", variable, self.suffix())
    }
}

impl fmt::Display for DailyStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_column_names() {
        assert_eq!(DailyStat::Mean.column_name("temp_max"), TEMP_MAX_MEAN);
        assert_eq!(DailyStat::Std.column_name("humidity"), "humidity_std");
        assert_eq!(DailyStat::Min.to_string(), "min");
    }

    #[test]
    fn test_feature_order_has_no_duplicates() {
        let mut names = FEATURE_ORDER.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_ORDER.len());
    }
}
