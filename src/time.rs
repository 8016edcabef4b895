use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Result of [`normalize_date`]. `Unavailable` is the sentinel callers format as
/// "n/a" and sort last; it is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NormalizedDate {
    Unavailable,
    At(DateTime<Utc>),
}

impl NormalizedDate {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            NormalizedDate::At(dt) => Some(*dt),
            NormalizedDate::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, NormalizedDate::At(_))
    }

    /// `dd/mm/yyyy` or `n/a`.
    pub fn display_day(&self) -> String {
        match self {
            NormalizedDate::At(dt) => dt.format("%d/%m/%Y").to_string(),
            NormalizedDate::Unavailable => "n/a".to_string(),
        }
    }

    pub fn to_rfc3339(&self) -> Option<String> {
        self.as_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Every shape a date field has been stored in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateLike {
    /// `{ seconds, nanoseconds }` as written by the hosted store's timestamp type.
    Timestamp {
        seconds: i64,
        #[serde(default, alias = "nanos")]
        nanoseconds: u32,
    },
    /// Epoch milliseconds.
    Millis(i64),
    Text(String),
}

impl From<DateTime<Utc>> for DateLike {
    fn from(value: DateTime<Utc>) -> Self {
        DateLike::Text(value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl DateLike {
    pub fn normalize(&self) -> NormalizedDate {
        match self {
            DateLike::Timestamp {
                seconds,
                nanoseconds,
            } => Utc
                .timestamp_opt(*seconds, *nanoseconds)
                .single()
                .map(NormalizedDate::At)
                .unwrap_or(NormalizedDate::Unavailable),
            DateLike::Millis(ms) => from_millis(*ms),
            DateLike::Text(text) => parse_text(text),
        }
    }
}

fn from_millis(ms: i64) -> NormalizedDate {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(NormalizedDate::At)
        .unwrap_or(NormalizedDate::Unavailable)
}

fn parse_text(text: &str) -> NormalizedDate {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NormalizedDate::Unavailable;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return NormalizedDate::At(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return NormalizedDate::At(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return day
            .and_hms_opt(0, 0, 0)
            .map(|naive| NormalizedDate::At(naive.and_utc()))
            .unwrap_or(NormalizedDate::Unavailable);
    }
    match trimmed.parse::<i64>() {
        Ok(ms) => from_millis(ms),
        Err(_) => NormalizedDate::Unavailable,
    }
}

/// Normalizes a raw document field into a date. Accepts `{seconds, nanoseconds}`
/// objects, RFC 3339 / ISO strings, `YYYY-MM-DD`, epoch-millisecond numbers or
/// numeric strings. Anything else, including `null`, is `Unavailable`.
pub fn normalize_date(value: &Value) -> NormalizedDate {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(ms) => from_millis(ms),
            None => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| from_millis(f as i64))
                .unwrap_or(NormalizedDate::Unavailable),
        },
        Value::String(text) => parse_text(text),
        Value::Object(_) => serde_json::from_value::<DateLike>(value.clone())
            .map(|like| like.normalize())
            .unwrap_or(NormalizedDate::Unavailable),
        _ => NormalizedDate::Unavailable,
    }
}

/// Native dates pass through untouched.
pub fn normalize_native(value: DateTime<Utc>) -> NormalizedDate {
    NormalizedDate::At(value)
}
