use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{decimal_field, first_field, parse_decimal, parse_timestamp};
use crate::models::{HistoryPoint, HistorySeries};

/// Object fields that may carry the observation time, in lookup order.
pub const TIMESTAMP_FIELDS: &[&str] = &[
    "timestamp",
    "time",
    "t",
    "date",
    "datetime",
    "open_time",
    "openTime",
];

/// Object fields that may carry the price, in lookup order.
pub const PRICE_FIELDS: &[&str] = &["price", "close", "c", "value", "p", "last"];

/// Object fields that may carry traded volume, in lookup order.
pub const VOLUME_FIELDS: &[&str] = &["volume", "v", "total_volume", "quote_volume"];

// OHLC arrays are [open_time, open, high, low, close, volume, ...]
const OHLC_MIN_LEN: usize = 5;
const OHLC_CLOSE_INDEX: usize = 4;
const OHLC_VOLUME_INDEX: usize = 5;

/// Normalize one raw point, or `None` when it cannot be used.
///
/// Objects are searched through the candidate field lists. Arrays are read
/// positionally: index 0 is the time, and the price is index 4 for OHLC
/// rows or index 1 for `[time, price]` pairs.
pub fn normalize_point(raw: &Value) -> Option<HistoryPoint> {
    let (timestamp, price, volume) = match raw {
        Value::Object(object) => {
            let timestamp = first_field(object, TIMESTAMP_FIELDS).and_then(parse_timestamp)?;
            let price = decimal_field(object, PRICE_FIELDS)?;
            let volume = decimal_field(object, VOLUME_FIELDS);
            (timestamp, price, volume)
        }
        Value::Array(row) if row.len() >= 2 => {
            let timestamp = parse_timestamp(&row[0])?;
            let (price, volume) = if row.len() >= OHLC_MIN_LEN {
                (
                    parse_decimal(&row[OHLC_CLOSE_INDEX])?,
                    row.get(OHLC_VOLUME_INDEX).and_then(parse_decimal),
                )
            } else {
                (parse_decimal(&row[1])?, row.get(2).and_then(parse_decimal))
            };
            (timestamp, price, volume)
        }
        _ => return None,
    };

    if price <= Decimal::ZERO {
        return None;
    }

    Some(HistoryPoint::new(timestamp, price).with_volume(volume))
}

/// Normalize a provider's raw history into a canonical series.
///
/// Unusable points are dropped; the survivors are sorted ascending with
/// duplicate instants collapsed to the last observation. Returns `None`
/// when nothing survives.
pub fn normalize_history(raw: &[Value]) -> Option<HistorySeries> {
    let points: Vec<HistoryPoint> = raw.iter().filter_map(normalize_point).collect();

    let dropped = raw.len() - points.len();
    if dropped > 0 {
        debug!(
            "History normalization dropped {} of {} raw points",
            dropped,
            raw.len()
        );
    }

    HistorySeries::from_points(points)
}
