use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::TrackerError;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Format used for timestamps inside the database. Fixed width, so text comparison in SQL follows
/// chronological order, and SQLite's `strftime('%s', ..)` understands it.
pub const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// This is the standard way of converting a date to a string in timetrail.
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DD` day coming from a client.
pub fn parse_day(value: &str) -> Result<NaiveDate, TrackerError> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
        .map_err(|_| TrackerError::validation(format!("invalid date '{value}', expected YYYY-MM-DD")))
}

pub fn format_store_time(time: DateTime<Utc>) -> String {
    time.format(STORE_TIME_FORMAT).to_string()
}

pub fn parse_store_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, STORE_TIME_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid stored timestamp '{value}': {e}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Half open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, moment: DateTime<Utc>) -> bool {
        self.start <= moment && moment < self.end
    }

    /// Range covering the local days `first..=last`.
    pub fn local_days(first: NaiveDate, last: NaiveDate) -> Self {
        Self::days_in(&Local, first, last)
    }

    pub fn days_in<Tz: TimeZone>(tz: &Tz, first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: day_start_in(tz, first),
            end: day_start_in(tz, last + Duration::days(1)),
        }
    }
}

/// Start of `date` in the given zone. Days that don't start at midnight (DST gaps) start at the
/// first existing moment after it.
fn day_start_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map(|v| v.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{format_store_time, parse_day, parse_store_time, TimeRange};

    #[test]
    fn parses_days_strictly() {
        assert_eq!(
            parse_day("2024-04-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap()
        );
        assert!(parse_day("05/04/2024").is_err());
        assert!(parse_day("2024-13-01").is_err());
        assert!(parse_day("").is_err());
    }

    #[test]
    fn store_time_is_ordered_as_text() {
        let earlier = Utc.with_ymd_and_hms(2024, 4, 5, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 4, 5, 10, 0, 0).unwrap();
        assert!(format_store_time(earlier) < format_store_time(later));
        assert_eq!(parse_store_time(&format_store_time(later)).unwrap(), later);
    }

    #[test]
    fn utc_days_cover_inclusive_range() {
        let first = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        let last = NaiveDate::from_ymd_opt(2024, 4, 6).unwrap();
        let range = TimeRange::days_in(&Utc, first, last);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 4, 7, 0, 0, 0).unwrap());
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 4, 6, 23, 59, 59).unwrap()));
        assert!(!range.contains(range.end));
    }
}
