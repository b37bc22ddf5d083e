//! Canonical data validation.
//!
//! Checks normalized provider output before it is cached or returned:
//! - Price must be positive (the canonical invariant)
//! - 24h range must be consistent (high >= low)
//! - Volumes and market caps cannot be negative
//! - Timestamps far in the future are rejected
//!
//! Hard issues reject the payload and the orchestrator moves to the next
//! provider. Soft issues are logged and the payload is accepted.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{CanonicalQuote, HistorySeries};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject payload, try next provider.
    Hard,
    /// Soft warning - accept payload but log warning.
    Soft,
}

/// A single finding.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Description of the issue.
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message,
        }
    }

    fn soft(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message,
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Reject quotes where high < low.
    pub reject_inverted_range: bool,
    /// Prices above this are rejected as garbage.
    pub max_price: Option<Decimal>,
    /// How far ahead of the local clock a timestamp may be.
    pub max_clock_skew: ChronoDuration,
    /// Quotes older than this are accepted with a warning.
    pub stale_after: Option<ChronoDuration>,
    /// Warn on zero 24h volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_inverted_range: true,
            max_price: Some(Decimal::from(1_000_000_000_000i64)),
            max_clock_skew: ChronoDuration::minutes(5),
            stale_after: Some(ChronoDuration::hours(24)),
            warn_on_zero_volume: false,
        }
    }
}

/// Validator for canonical quotes and history series.
pub struct DataValidator {
    config: ValidatorConfig,
}

impl DataValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a quote.
    ///
    /// Returns Ok(()) if the quote is acceptable. Warnings are logged but
    /// do not cause rejection.
    pub fn validate_quote(&self, quote: &CanonicalQuote) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        let now = Utc::now();

        self.check_price("price", quote.price, &mut issues);

        if let (Some(high), Some(low)) = (quote.high_24h, quote.low_24h) {
            if self.config.reject_inverted_range && high < low {
                issues.push(ValidationIssue::hard(format!(
                    "24h high ({}) is less than low ({})",
                    high, low
                )));
            }
        }

        self.check_non_negative("volume_24h", quote.volume_24h, &mut issues);
        self.check_non_negative("market_cap", quote.market_cap, &mut issues);

        if self.config.warn_on_zero_volume && quote.volume_24h == Some(Decimal::ZERO) {
            issues.push(ValidationIssue::soft("Zero 24h volume".to_string()));
        }

        self.check_timestamp(quote.last_updated, now, &mut issues);

        if let Some(stale_after) = self.config.stale_after {
            if now - quote.last_updated > stale_after {
                issues.push(ValidationIssue::soft(format!(
                    "Quote last updated at {}",
                    quote.last_updated
                )));
            }
        }

        Self::finish(&quote.symbol, issues)
    }

    /// Validate a history series.
    ///
    /// Ordering and positivity are guaranteed by [`HistorySeries`] itself;
    /// this adds the range and clock checks.
    pub fn validate_history(
        &self,
        symbol: &str,
        series: &HistorySeries,
    ) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        let now = Utc::now();

        if series.is_empty() {
            issues.push(ValidationIssue::hard("Empty history series".to_string()));
        }

        for point in series.points() {
            self.check_price("history price", point.price, &mut issues);
            self.check_non_negative("history volume", point.volume, &mut issues);
        }

        if let Some(last) = series.last() {
            self.check_timestamp(last.timestamp, now, &mut issues);
        }

        Self::finish(symbol, issues)
    }

    fn check_price(&self, field: &str, price: Decimal, issues: &mut Vec<ValidationIssue>) {
        if price <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!(
                "Non-positive {}: {}",
                field, price
            )));
        }
        if let Some(max_price) = self.config.max_price {
            if price > max_price {
                issues.push(ValidationIssue::hard(format!(
                    "{} ({}) exceeds sanity limit ({})",
                    field, price, max_price
                )));
            }
        }
    }

    fn check_non_negative(
        &self,
        field: &str,
        value: Option<Decimal>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if let Some(value) = value {
            if value < Decimal::ZERO {
                issues.push(ValidationIssue::hard(format!(
                    "Negative {}: {}",
                    field, value
                )));
            }
        }
    }

    fn check_timestamp(
        &self,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if timestamp - now > self.config.max_clock_skew {
            issues.push(ValidationIssue::hard(format!(
                "Timestamp {} is in the future",
                timestamp
            )));
        }
    }

    fn finish(symbol: &str, issues: Vec<ValidationIssue>) -> Result<(), MarketDataError> {
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: errors.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Validation warning for '{}': {}", symbol, issue.message);
        }

        Ok(())
    }
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryPoint;
    use rust_decimal_macros::dec;

    fn make_quote(price: Decimal) -> CanonicalQuote {
        CanonicalQuote::new("bitcoin", price, Utc::now(), "TEST")
            .with_range(Some(dec!(105)), Some(dec!(95)))
            .with_volume(Some(dec!(1000)))
    }

    #[test]
    fn test_valid_quote() {
        let validator = DataValidator::new();
        assert!(validator.validate_quote(&make_quote(dec!(100))).is_ok());
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let validator = DataValidator::new();

        for price in [dec!(0), dec!(-10)] {
            let result = validator.validate_quote(&make_quote(price));
            match result {
                Err(MarketDataError::ValidationFailed { message }) => {
                    assert!(message.contains("Non-positive price"))
                }
                other => panic!("expected validation failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_inverted_range_rejected() {
        let validator = DataValidator::new();
        let quote = make_quote(dec!(100)).with_range(Some(dec!(90)), Some(dec!(95)));

        let result = validator.validate_quote(&quote);
        assert!(matches!(
            result,
            Err(MarketDataError::ValidationFailed { ref message }) if message.contains("less than low")
        ));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let validator = DataValidator::new();
        let quote = make_quote(dec!(100)).with_volume(Some(dec!(-1000)));
        assert!(validator.validate_quote(&quote).is_err());
    }

    #[test]
    fn test_future_quote_rejected() {
        let validator = DataValidator::new();
        let mut quote = make_quote(dec!(100));
        quote.last_updated = Utc::now() + ChronoDuration::hours(2);
        assert!(validator.validate_quote(&quote).is_err());
    }

    #[test]
    fn test_stale_quote_is_only_a_warning() {
        let validator = DataValidator::new();
        let mut quote = make_quote(dec!(100));
        quote.last_updated = Utc::now() - ChronoDuration::days(3);
        assert!(validator.validate_quote(&quote).is_ok());
    }

    #[test]
    fn test_sanity_limit() {
        let validator = DataValidator::with_config(ValidatorConfig {
            max_price: Some(dec!(1000)),
            ..Default::default()
        });
        assert!(validator.validate_quote(&make_quote(dec!(5000))).is_err());

        let unlimited = DataValidator::with_config(ValidatorConfig {
            max_price: None,
            ..Default::default()
        });
        assert!(unlimited.validate_quote(&make_quote(dec!(5000))).is_ok());
    }

    #[test]
    fn test_history_validation() {
        let validator = DataValidator::new();
        let now = Utc::now();

        let series = HistorySeries::from_points(vec![
            HistoryPoint::new(now - ChronoDuration::days(1), dec!(10)),
            HistoryPoint::new(now, dec!(11)).with_volume(Some(dec!(5))),
        ])
        .unwrap();
        assert!(validator.validate_history("bitcoin", &series).is_ok());

        let negative_volume = HistorySeries::from_points(vec![
            HistoryPoint::new(now, dec!(11)).with_volume(Some(dec!(-5)))
        ])
        .unwrap();
        assert!(validator.validate_history("bitcoin", &negative_volume).is_err());

        let future = HistorySeries::from_points(vec![HistoryPoint::new(
            now + ChronoDuration::days(2),
            dec!(11),
        )])
        .unwrap();
        assert!(validator.validate_history("bitcoin", &future).is_err());
    }
}
