//! Minute-resolution time keys.
//!
//! Every fire time in the system is a [`MinuteKey`]: a naive wall-clock
//! instant truncated to the minute. Its display form is `YYYY-MM-DD HH:MM`;
//! the storage form appends `:00` so SQLite text comparisons stay stable.

use crate::error::CoreError;
use chrono::{
    DateTime, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc,
};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};
use std::fmt;
use std::str::FromStr;

const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M";
const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:00";

/// Full date-time layouts tried after the canonical prefix check.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteKey(NaiveDateTime);

impl MinuteKey {
    /// Truncates seconds and sub-seconds away.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        let truncated = dt
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(dt);
        Self(truncated)
    }

    pub fn from_ymd_hm(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self(NaiveDateTime::new(date, time)))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// `YYYY-MM-DD HH:MM:00`, the form written to the database.
    pub fn storage_form(&self) -> String {
        self.0.format(STORAGE_FORMAT).to_string()
    }

    pub fn plus_minutes(self, minutes: i64) -> Result<Self, CoreError> {
        self.0
            .checked_add_signed(Duration::minutes(minutes))
            .map(Self)
            .ok_or_else(|| out_of_range(self, &format!("{minutes} minute(s)")))
    }

    pub fn plus_days(self, days: u32) -> Result<Self, CoreError> {
        self.0
            .checked_add_signed(Duration::days(i64::from(days)))
            .map(Self)
            .ok_or_else(|| out_of_range(self, &format!("{days} day(s)")))
    }

    /// Calendar month arithmetic. The day of month is kept when it exists in
    /// the target month and clamped to the month's last day otherwise.
    pub fn plus_months(self, months: u32) -> Result<Self, CoreError> {
        self.0
            .checked_add_months(Months::new(months))
            .map(Self)
            .ok_or_else(|| out_of_range(self, &format!("{months} month(s)")))
    }
}

fn out_of_range(key: MinuteKey, delta: &str) -> CoreError {
    CoreError::InvalidInput(format!("{key} + {delta} is out of the supported date range"))
}

impl fmt::Display for MinuteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for MinuteKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_minute_key(s)
    }
}

/// Canonicalizes a date-time representation to a [`MinuteKey`].
///
/// A canonical prefix (`YYYY-MM-DD HH:MM`, space or `T` separated) is taken
/// as is and anything after the minute is ignored. Other layouts are tried in
/// turn, ending with natural-language parsing (`"tomorrow 9:00"`).
pub fn to_minute_key(input: &str) -> Result<MinuteKey, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidTimeFormat("empty time value".to_string()));
    }

    if let Some(key) = parse_canonical_prefix(trimmed) {
        return Ok(key);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        // Keep the wall clock as written; minute keys carry no zone.
        return Ok(MinuteKey::from_naive(dt.naive_local()));
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(MinuteKey::from_naive(dt));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(MinuteKey::from_naive(date.and_time(NaiveTime::MIN)));
        }
    }

    parse_date_string(trimmed, Local::now(), Dialect::Uk)
        .map(|dt| MinuteKey::from_naive(dt.naive_local()))
        .map_err(|_| CoreError::InvalidTimeFormat(input.to_string()))
}

fn parse_canonical_prefix(s: &str) -> Option<MinuteKey> {
    let bytes = s.as_bytes();
    if bytes.len() < 16 || !s.is_char_boundary(16) {
        return None;
    }
    let shaped = bytes[4] == b'-'
        && bytes[7] == b'-'
        && (bytes[10] == b' ' || bytes[10] == b'T')
        && bytes[13] == b':';
    if !shaped {
        return None;
    }
    let date = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(&s[11..16], "%H:%M").ok()?;
    Some(MinuteKey(NaiveDateTime::new(date, time)))
}

/// The current minute on the local wall clock.
pub fn now_minute() -> MinuteKey {
    MinuteKey::from_naive(Local::now().naive_local())
}

/// The current minute in the given IANA zone.
pub fn now_minute_in(tz: &Tz) -> MinuteKey {
    MinuteKey::from_naive(Utc::now().with_timezone(tz).naive_local())
}

impl Serialize for MinuteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        to_minute_key(&raw).map_err(serde::de::Error::custom)
    }
}

impl Type<Sqlite> for MinuteKey {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for MinuteKey {
    fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
        <String as Encode<'q, Sqlite>>::encode(self.storage_form(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for MinuteKey {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<'r, Sqlite>>::decode(value)?;
        Ok(to_minute_key(raw)?)
    }
}
