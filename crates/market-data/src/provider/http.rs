//! HTTP plumbing shared by the reference adapters.

use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::errors::MarketDataError;

/// Build a client with the adapter's upstream timeout.
pub(crate) fn build_client(timeout: std::time::Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request and return the body of a successful response.
///
/// `Ok(None)` means the provider answered that it has nothing for this
/// request (see [`classify_response`]).
pub(crate) async fn send(
    provider: &str,
    request: RequestBuilder,
) -> Result<Option<String>, MarketDataError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MarketDataError::transport(provider, format!("Request failed: {}", e))
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        MarketDataError::transport(provider, format!("Failed to read response: {}", e))
    })?;

    debug!("{} responded {} ({} bytes)", provider, status, body.len());
    classify_response(provider, status, body)
}

/// Map an HTTP status and body onto the error taxonomy.
///
/// - 429 is an explicit quota breach
/// - 401/403 reject the credential
/// - 400/404 complaining about an unknown symbol or coin is "no data"
/// - any other non-2xx is a transport failure
/// - a 2xx with an empty body is "no data"
pub(crate) fn classify_response(
    provider: &str,
    status: StatusCode,
    body: String,
) -> Result<Option<String>, MarketDataError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketDataError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MarketDataError::Auth {
            provider: provider.to_string(),
        });
    }

    if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
        if is_unknown_symbol(&body) {
            return Ok(None);
        }
        return Err(MarketDataError::transport(
            provider,
            format!("HTTP {} - {}", status, truncate(&body)),
        ));
    }

    if !status.is_success() {
        return Err(MarketDataError::transport(
            provider,
            format!("HTTP {} - {}", status, truncate(&body)),
        ));
    }

    if body.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(body))
}

fn is_unknown_symbol(body: &str) -> bool {
    let lower = body.to_lowercase();
    body.trim().is_empty()
        || lower.contains("invalid symbol")
        || lower.contains("not found")
        || lower.contains("could not find")
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_and_auth() {
        let err = classify_response("BINANCE", StatusCode::TOO_MANY_REQUESTS, String::new())
            .unwrap_err();
        assert!(err.is_rate_limited());

        let err = classify_response("COINGECKO", StatusCode::FORBIDDEN, String::new()).unwrap_err();
        assert!(matches!(err, MarketDataError::Auth { .. }));
    }

    #[test]
    fn test_invalid_symbol_is_empty() {
        let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#.to_string();
        assert_eq!(classify_response("BINANCE", StatusCode::BAD_REQUEST, body), Ok(None));

        let body = r#"{"error":"coin not found"}"#.to_string();
        assert_eq!(classify_response("COINGECKO", StatusCode::NOT_FOUND, body), Ok(None));
    }

    #[test]
    fn test_other_statuses_are_transport() {
        let err = classify_response("BINANCE", StatusCode::BAD_GATEWAY, "upstream".to_string())
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Transport { .. }));

        let body = r#"{"code":-1100,"msg":"Illegal characters found in parameter"}"#.to_string();
        let err = classify_response("BINANCE", StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, MarketDataError::Transport { .. }));
    }

    #[test]
    fn test_success_bodies() {
        assert_eq!(classify_response("X", StatusCode::OK, "  ".to_string()), Ok(None));
        assert_eq!(
            classify_response("X", StatusCode::OK, "{}".to_string()),
            Ok(Some("{}".to_string()))
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(150);
        let cut = truncate(&body);
        assert!(cut.len() <= 200);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
