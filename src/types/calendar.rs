//! Calendar-derived features and conversions between `NaiveDate` and the
//! day-count representation polars uses for `Date` columns.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

/// Day zero of the polars `Date` physical representation.
pub fn epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn epoch_days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

/// Season bucket: `(month mod 12) div 3 + 1`.
///
/// December shares season 1 with January and February; the quantization is not
/// aligned to astronomical or meteorological seasons and must stay that way, as
/// the trained models were fitted on it.
pub fn season(month: u32) -> u32 {
    (month % 12) / 3 + 1
}

/// Features that depend only on the calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub season: u32,
    /// 1..=366
    pub day_of_year: u32,
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        let day_of_week = date.weekday().num_days_from_monday();
        Self {
            season: season(date.month()),
            day_of_year: date.ordinal(),
            day_of_week,
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_quantization() {
        assert_eq!(season(12), 1);
        assert_eq!(season(1), 1);
        assert_eq!(season(2), 1);
        assert_eq!(season(3), 2);
        assert_eq!(season(5), 2);
        assert_eq!(season(6), 3);
        assert_eq!(season(9), 4);
        assert_eq!(season(11), 4);
    }

    #[test]
    fn test_calendar_features() {
        // 2024-01-06 is a Saturday
        let sat = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let features = CalendarFeatures::from_date(sat);
        assert_eq!(features.day_of_year, 6);
        assert_eq!(features.day_of_week, 5);
        assert!(features.is_weekend);
        assert_eq!(features.season, 1);

        let mon = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let features = CalendarFeatures::from_date(mon);
        assert_eq!(features.day_of_week, 0);
        assert!(!features.is_weekend);

        let leap_end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(CalendarFeatures::from_date(leap_end).day_of_year, 366);
    }

    #[test]
    fn test_epoch_days_round_trip() {
        let date = NaiveDate::from_ymd_opt(2020, 7, 15).unwrap();
        assert_eq!(epoch_days_to_date(date_to_epoch_days(date)), date);
        assert_eq!(date_to_epoch_days(epoch()), 0);
        assert_eq!(date_to_epoch_days(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }
}
