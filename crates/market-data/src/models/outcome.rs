use crate::errors::MarketDataError;

/// Result of a single adapter call.
///
/// Separates "the provider answered and has nothing for this symbol" from
/// "we could not determine an answer", which a plain `Result<Option<T>>`
/// tends to blur at call sites.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome<T> {
    /// The provider returned usable data.
    Data(T),
    /// The provider legitimately has no data for this request.
    Empty,
    /// The call failed; the error says why.
    Failure(MarketDataError),
}

impl<T> FetchOutcome<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Data(value) => FetchOutcome::Data(f(value)),
            Self::Empty => FetchOutcome::Empty,
            Self::Failure(e) => FetchOutcome::Failure(e),
        }
    }
}

impl<T> From<Result<Option<T>, MarketDataError>> for FetchOutcome<T> {
    fn from(result: Result<Option<T>, MarketDataError>) -> Self {
        match result {
            Ok(Some(value)) => Self::Data(value),
            Ok(None) => Self::Empty,
            Err(e) => Self::Failure(e),
        }
    }
}
