//! Date parsing and bucket arithmetic for the statistics table.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use contracts::dashboards::d402_logistics_statistics::Granularity;

use super::error::StatisticsError;

/// Format of bucket keys and `aggregate_date` values
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of histogram point dates, e.g. "11-03-2024"
pub const HISTOGRAM_DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse a record or range date.
///
/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM:SS[.fff]` and RFC 3339. An offset is dropped and the
/// wall-clock time is kept, so a row stays on the calendar day it names.
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, StatisticsError> {
    let s = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(datetime);
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.naive_local());
    }

    Err(StatisticsError::InvalidDate(value.to_string()))
}

/// Parse a histogram date (`DD-MM-YYYY`)
pub fn parse_histogram_date(value: &str) -> Result<NaiveDate, StatisticsError> {
    NaiveDate::parse_from_str(value.trim(), HISTOGRAM_DATE_FORMAT)
        .map_err(|_| StatisticsError::InvalidDate(value.to_string()))
}

/// First day of the bucket that contains `date`. Weeks start on Monday.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
    }
}

/// Bucket key of `date`, formatted `YYYY-MM-DD`
pub fn bucket_key(date: NaiveDate, granularity: Granularity) -> String {
    bucket_start(date, granularity).format(DATE_FORMAT).to_string()
}

/// Calendar month of `date`, formatted `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
