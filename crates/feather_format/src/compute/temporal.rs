//! Conversions between on-disk tick counts and chrono types.
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::datatype::TimeUnit;

pub const EPOCH_NAIVE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    _ => unreachable!(),
};

pub const SECONDS_IN_DAY: i64 = 86400;

/// Trait for converting an i64 tick count to a chrono DateTime.
pub trait DateTimeFromTimestamp {
    fn from_ticks(val: i64) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeFromSeconds;
impl DateTimeFromTimestamp for DateTimeFromSeconds {
    fn from_ticks(val: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(val, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeFromMilliseconds;
impl DateTimeFromTimestamp for DateTimeFromMilliseconds {
    fn from_ticks(val: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(val)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeFromMicroseconds;
impl DateTimeFromTimestamp for DateTimeFromMicroseconds {
    fn from_ticks(val: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(val)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeFromNanoseconds;
impl DateTimeFromTimestamp for DateTimeFromNanoseconds {
    fn from_ticks(val: i64) -> Option<DateTime<Utc>> {
        Some(DateTime::from_timestamp_nanos(val))
    }
}

/// Instant for a timestamp stored as ticks since epoch.
pub fn timestamp_to_datetime(val: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTimeFromSeconds::from_ticks(val),
        TimeUnit::Millisecond => DateTimeFromMilliseconds::from_ticks(val),
        TimeUnit::Microsecond => DateTimeFromMicroseconds::from_ticks(val),
        TimeUnit::Nanosecond => DateTimeFromNanoseconds::from_ticks(val),
    }
}

/// Ticks since epoch for an instant, truncating anything finer than `unit`.
///
/// Returns None if the instant doesn't fit in 64 bits of nanoseconds.
pub fn datetime_to_timestamp(datetime: &DateTime<Utc>, unit: TimeUnit) -> Option<i64> {
    match unit {
        TimeUnit::Second => Some(datetime.timestamp()),
        TimeUnit::Millisecond => Some(datetime.timestamp_millis()),
        TimeUnit::Microsecond => Some(datetime.timestamp_micros()),
        TimeUnit::Nanosecond => datetime.timestamp_nanos_opt(),
    }
}

/// Midnight UTC of a date stored as days since epoch.
pub fn date_to_datetime(days: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp((days as i64) * SECONDS_IN_DAY, 0)
}

/// Duration for a time of day stored as ticks.
pub fn time_to_timedelta(val: i64, unit: TimeUnit) -> Option<TimeDelta> {
    match unit {
        TimeUnit::Second => TimeDelta::try_seconds(val),
        TimeUnit::Millisecond => TimeDelta::try_milliseconds(val),
        TimeUnit::Microsecond => Some(TimeDelta::microseconds(val)),
        TimeUnit::Nanosecond => Some(TimeDelta::nanoseconds(val)),
    }
}

/// Ticks for a duration, truncating anything finer than `unit`.
pub fn timedelta_to_time(delta: &TimeDelta, unit: TimeUnit) -> Option<i64> {
    match unit {
        TimeUnit::Second => Some(delta.num_seconds()),
        TimeUnit::Millisecond => Some(delta.num_milliseconds()),
        TimeUnit::Microsecond => delta.num_microseconds(),
        TimeUnit::Nanosecond => delta.num_nanoseconds(),
    }
}
