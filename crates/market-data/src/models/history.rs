use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single observation in a price history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl HistoryPoint {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            price,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: Option<Decimal>) -> Self {
        self.volume = volume;
        self
    }
}

/// Ordered price history for one symbol.
///
/// Points are strictly ascending by timestamp and every price is positive.
/// The only way to build a series is through [`HistorySeries::from_points`],
/// which enforces both, so a deserialized series is re-checked too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoryPoint>", into = "Vec<HistoryPoint>")]
pub struct HistorySeries {
    points: Vec<HistoryPoint>,
}

impl HistorySeries {
    /// Build a series from points in any order.
    ///
    /// Non-positive prices are dropped, the rest sorted by timestamp. When two
    /// points share an instant the later one in the input wins. Returns `None`
    /// when nothing survives.
    pub fn from_points(points: Vec<HistoryPoint>) -> Option<Self> {
        let mut points: Vec<HistoryPoint> = points
            .into_iter()
            .filter(|p| p.price > Decimal::ZERO)
            .collect();

        // Stable sort keeps input order among equal timestamps
        points.sort_by_key(|p| p.timestamp);

        let mut deduped: Vec<HistoryPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }

        if deduped.is_empty() {
            None
        } else {
            Some(Self { points: deduped })
        }
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&HistoryPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    pub fn into_points(self) -> Vec<HistoryPoint> {
        self.points
    }
}

impl TryFrom<Vec<HistoryPoint>> for HistorySeries {
    type Error = String;

    fn try_from(points: Vec<HistoryPoint>) -> Result<Self, Self::Error> {
        Self::from_points(points).ok_or_else(|| "history series has no valid points".to_string())
    }
}

impl From<HistorySeries> for Vec<HistoryPoint> {
    fn from(series: HistorySeries) -> Self {
        series.points
    }
}

/// How much history a request covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct HistoryWindow {
    days: u32,
}

impl HistoryWindow {
    /// A window of `days` days, at least one.
    pub fn days(days: u32) -> Self {
        Self { days: days.max(1) }
    }

    pub fn num_days(&self) -> u32 {
        self.days
    }

    /// Parameter fragment used in cache keys.
    pub fn cache_params(&self) -> String {
        format!("days={}", self.days)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::days(30)
    }
}

/// History returned to callers together with the provider that served it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub series: HistorySeries,
    /// Provider id, or "cache" when served from the cache
    pub provider_source: String,
}
