//! Reminder definitions from JSON.
//!
//! The input is an array of objects:
//!
//! ```json
//! [{"text": "Платеж", "fire_times": ["2025-08-06 14:30"], "targets": ["@alice", 123456789], "recurrence": "1m"}]
//! ```
//!
//! `message`, `dates`, `raw_targets` and `repeat` are accepted as aliases.

use crate::error::CoreError;
use crate::models::ReminderIntent;
use crate::recurrence::RepeatRule;
use crate::time::to_minute_key;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTarget {
    Number(i64),
    /// Spreadsheet exports turn ids into floats (`123456789.0`).
    Float(f64),
    Text(String),
}

impl RawTarget {
    fn into_string(self) -> String {
        match self {
            RawTarget::Number(n) => n.to_string(),
            RawTarget::Float(f) if f.fract() == 0.0 && f.abs() < 1e18 => (f as i64).to_string(),
            RawTarget::Float(f) => f.to_string(),
            RawTarget::Text(s) => s,
        }
    }
}

/// A reminder definition as it appears in the input, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIntent {
    #[serde(alias = "message", default)]
    pub text: String,
    #[serde(alias = "dates", default)]
    pub fire_times: Vec<String>,
    #[serde(alias = "raw_targets", default)]
    pub targets: Vec<RawTarget>,
    #[serde(alias = "repeat", default)]
    pub recurrence: Value,
}

impl RawIntent {
    /// Canonicalizes fire times and the recurrence. Unparseable times are
    /// dropped with a warning; an unknown recurrence becomes one-time.
    pub fn normalize(self) -> ReminderIntent {
        let mut fire_times = Vec::with_capacity(self.fire_times.len());
        for raw in &self.fire_times {
            match to_minute_key(raw) {
                Ok(key) => fire_times.push(key),
                Err(err) => warn!(input = %raw, error = %err, "Dropping unparseable fire time"),
            }
        }

        ReminderIntent {
            text: self.text.trim().to_string(),
            fire_times,
            raw_targets: self.targets.into_iter().map(RawTarget::into_string).collect(),
            repeat: RepeatRule::normalize(&self.recurrence),
        }
    }
}

/// Reads the array of definitions. Only a document that is not a JSON array
/// fails; elements that do not fit the definition shape are skipped with a
/// warning.
pub fn parse_raw_intents(input: &str) -> Result<Vec<RawIntent>, CoreError> {
    let values: Vec<Value> =
        serde_json::from_str(input).map_err(|e| CoreError::InvalidInput(format!("reminder definitions: {e}")))?;

    let mut intents = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawIntent>(value) {
            Ok(intent) => intents.push(intent),
            Err(err) => warn!(index, error = %err, "Skipping malformed reminder definition"),
        }
    }
    Ok(intents)
}

/// Parses and normalizes a JSON array of reminder definitions.
pub fn parse_intents(input: &str) -> Result<Vec<ReminderIntent>, CoreError> {
    Ok(parse_raw_intents(input)?
        .into_iter()
        .map(RawIntent::normalize)
        .collect())
}
