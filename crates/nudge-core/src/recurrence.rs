use crate::error::CoreError;
use crate::time::MinuteKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Longest accepted daily interval, about a century.
pub const MAX_DAILY_INTERVAL: u32 = 36_600;
pub const MAX_MONTHLY_INTERVAL: u32 = 1_200;

/// Recurrence policy of an event.
///
/// Built once at the ingestion or storage boundary; nothing downstream looks
/// at the raw representation again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RepeatRule {
    /// One-time event, deleted after a successful send.
    #[default]
    None,
    /// Every N days (N >= 1).
    Daily(u32),
    /// Every N calendar months (N >= 1).
    Monthly(u32),
}

impl RepeatRule {
    /// Normalizes a heterogeneous raw value.
    ///
    /// Accepts null, empty strings, positive integers, numeral strings,
    /// `"Nm"` (Latin or Cyrillic `m`) and `{"type": "month", "interval": N}`.
    /// Anything that cannot be classified becomes [`RepeatRule::None`]: a bad
    /// recurrence must never keep the underlying reminder from being stored.
    pub fn normalize(raw: &Value) -> Self {
        match raw {
            Value::Null => RepeatRule::None,
            Value::Number(_) => positive_interval(raw).map_or(RepeatRule::None, daily),
            Value::String(s) => Self::parse_compact(s).unwrap_or(RepeatRule::None),
            Value::Object(map) => {
                let interval = map.get("interval").and_then(positive_interval);
                let kind = map
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| t.trim().to_lowercase());
                match (kind.as_deref(), interval) {
                    (Some("month" | "months" | "monthly"), Some(n)) => monthly(n),
                    (Some("day" | "days" | "daily"), Some(n)) => daily(n),
                    _ => RepeatRule::None,
                }
            }
            _ => RepeatRule::None,
        }
    }

    /// Parses the compact scalar form (`"3"`, `"2m"`). Empty input means no
    /// recurrence; unrecognized input is `None` so callers can decide.
    fn parse_compact(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Some(RepeatRule::None);
        }
        let month_suffix = ['m', 'M', 'м', 'М'];
        if let Some(digits) = s.strip_suffix(|c: char| month_suffix.contains(&c)) {
            return parse_positive(digits.trim()).map(monthly);
        }
        parse_positive(s).map(daily)
    }

    /// Storage form: NULL, `"N"` or `"Nm"`.
    pub fn to_storage(&self) -> Option<String> {
        match self {
            RepeatRule::None => None,
            RepeatRule::Daily(n) => Some(n.to_string()),
            RepeatRule::Monthly(n) => Some(format!("{n}m")),
        }
    }

    /// Decodes the storage form. An unrecognized value is logged and read as
    /// a one-time event so that it cannot fire forever.
    pub fn from_storage(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return RepeatRule::None;
        };
        match Self::parse_compact(raw) {
            Some(rule) => rule,
            None => {
                warn!(stored = raw, "Unrecognized repeat rule in storage, treating as one-time");
                RepeatRule::None
            }
        }
    }

    pub fn is_repeating(&self) -> bool {
        !matches!(self, RepeatRule::None)
    }

    /// The next fire time after a successful send, or `None` for one-time events.
    pub fn advance(&self, from: MinuteKey) -> Result<Option<MinuteKey>, CoreError> {
        match *self {
            RepeatRule::None => Ok(None),
            RepeatRule::Daily(n) => from.plus_days(n).map(Some),
            RepeatRule::Monthly(n) => from.plus_months(n).map(Some),
        }
    }
}

fn daily(n: u32) -> RepeatRule {
    if n > MAX_DAILY_INTERVAL {
        warn!(interval = n, "Daily interval out of range, treating as one-time");
        return RepeatRule::None;
    }
    RepeatRule::Daily(n)
}

fn monthly(n: u32) -> RepeatRule {
    if n > MAX_MONTHLY_INTERVAL {
        warn!(interval = n, "Monthly interval out of range, treating as one-time");
        return RepeatRule::None;
    }
    RepeatRule::Monthly(n)
}

fn parse_positive(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

fn positive_interval(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                u32::try_from(i).ok().filter(|n| *n >= 1)
            } else {
                // Spreadsheets hand integers over as floats ("2.0").
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => parse_positive(s.trim()),
        _ => None,
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatRule::None => write!(f, "once"),
            RepeatRule::Daily(1) => write!(f, "daily"),
            RepeatRule::Daily(n) => write!(f, "every {n} days"),
            RepeatRule::Monthly(1) => write!(f, "monthly"),
            RepeatRule::Monthly(n) => write!(f, "every {n} months"),
        }
    }
}

impl Serialize for RepeatRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_storage() {
            Some(s) => serializer.serialize_some(&s),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for RepeatRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(RepeatRule::normalize(&raw))
    }
}
