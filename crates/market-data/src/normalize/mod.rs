//! Normalization of heterogeneous provider payloads.
//!
//! Providers disagree on field names, number encodings (JSON numbers vs
//! numeric strings) and time formats (epoch seconds, epoch milliseconds,
//! ISO-8601). The helpers here absorb those differences so adapters only
//! have to say *where* a value might live, not how to decode it.

mod history;

pub use history::{
    normalize_history, normalize_point, PRICE_FIELDS, TIMESTAMP_FIELDS, VOLUME_FIELDS,
};

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// Epoch values at or above this magnitude are milliseconds, below are seconds.
///
/// 1e12 seconds is tens of thousands of years away, while 1e12 milliseconds
/// is September 2001, so the ranges cannot be confused for real market data.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Decode a price-like value from a JSON number or numeric string.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                // serde_json renders the shortest round-trip form, which keeps
                // 0.1 as 0.1 instead of its binary expansion
                decimal_from_str(&n.to_string())
            }
        }
        Value::String(s) => decimal_from_str(s),
        _ => None,
    }
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Decode an instant from epoch seconds, epoch milliseconds or an ISO-8601 string.
///
/// Non-positive epochs are rejected as unparsable.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(epoch) = s.parse::<f64>() {
                return from_epoch(epoch);
            }
            parse_iso8601(s)
        }
        _ => None,
    }
}

fn from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch <= 0.0 {
        return None;
    }

    let millis = if epoch >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };

    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// First present, non-null field among `candidates`.
pub fn first_field<'a>(object: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// First candidate field that decodes as a decimal.
pub fn decimal_field(object: &Map<String, Value>, candidates: &[&str]) -> Option<Decimal> {
    candidates
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(parse_decimal)
}
