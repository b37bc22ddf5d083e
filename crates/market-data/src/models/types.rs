use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Kind of market data a request asks for.
///
/// Providers declare which categories they serve, and the priority
/// configuration, cache TTLs and timeouts are all keyed by category.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Latest price snapshot with 24h statistics.
    Quote,
    /// Time series of historical prices.
    History,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Quote, Category::History];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::History => "history",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
