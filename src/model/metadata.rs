use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{now, RecordingId, Timestamp};

/// The per-recording document tracking views and watch progress.
///
/// Documents are loose JSON: counters that are missing or hold something other than a
/// number read as zero, and fields this type does not know about are carried through
/// [Metadata::extra] so a rewrite does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "RecordingId::nil", deserialize_with = "lenient::recording_id")]
    pub video_id: RecordingId,
    #[serde(default = "now", deserialize_with = "lenient::timestamp")]
    pub created_at: Timestamp,
    #[serde(default, deserialize_with = "lenient::count")]
    pub views: u64,
    #[serde(default, deserialize_with = "lenient::duration")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::seconds")]
    pub watched_seconds: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(video_id: RecordingId, duration: Option<f64>) -> Self {
        Self {
            video_id,
            created_at: now(),
            views: 0,
            duration: duration.filter(|d| d.is_finite()),
            watched_seconds: 0.0,
            extra: Map::new(),
        }
    }

    /// Count one more play and return the new total.
    pub fn record_view(&mut self) -> u64 {
        self.views = self.views.saturating_add(1);
        self.views
    }

    /// Merge a reported playback position. Progress only ever moves forward.
    pub fn record_progress(&mut self, watched: WatchedSeconds) -> f64 {
        self.watched_seconds = self.watched_seconds.max(watched.get());
        self.watched_seconds
    }

    /// Percentage of the recording that has been watched, capped at 100.
    ///
    /// Returns `None` when the duration is unknown, since there is nothing to compare against.
    pub fn completion(&self) -> Option<f64> {
        let duration = self.duration.filter(|d| d.is_finite() && *d > 0.0)?;
        Some((self.watched_seconds / duration).min(1.0) * 100.0)
    }

    pub fn analytics(&self) -> Analytics {
        Analytics {
            views: self.views,
            watched_seconds: self.watched_seconds,
            duration: self.duration,
            completion: self.completion(),
        }
    }
}

/// Public view of a [Metadata] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub views: u64,
    pub watched_seconds: f64,
    pub duration: Option<f64>,
    pub completion: Option<f64>,
}

/// A playback position in seconds, finite and not negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct WatchedSeconds(f64);

impl WatchedSeconds {
    pub fn new(seconds: f64) -> Option<Self> {
        (seconds.is_finite() && seconds >= 0.0).then_some(Self(seconds))
    }

    /// Read a position reported by a client. Numeric strings are accepted and `null` counts as zero;
    /// booleans, arrays and objects are not positions.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Number(_) | Value::String(_) => Self::new(coerce_number(value)),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Loose numeric conversion used for client input and stored documents.
///
/// `null` and `false` are 0, `true` is 1, strings are parsed after trimming (an empty
/// string is 0) and anything else is NaN.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => parse_number(text),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Parse a form or JSON string as a number. Surrounding whitespace is ignored and an
/// empty string is 0. Unparseable input yields NaN.
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    text.parse().unwrap_or(f64::NAN)
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{coerce_number, now, RecordingId, Timestamp};

    pub fn recording_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RecordingId, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(|text| text.parse().ok())
            .unwrap_or_else(RecordingId::nil))
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_else(|_| now()))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = coerce_number(&Value::deserialize(deserializer)?);
        Ok(if value.is_finite() && value > 0.0 {
            value.trunc() as u64
        } else {
            0
        })
    }

    pub fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = coerce_number(&Value::deserialize(deserializer)?);
        Ok(if value.is_finite() && value > 0.0 { value } else { 0.0 })
    }

    pub fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(None);
        }

        let value = coerce_number(&value);
        Ok(value.is_finite().then_some(value))
    }
}
