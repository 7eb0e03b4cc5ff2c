//! Metering API client
//!
//! One call fetches the interval readings for a `[from, to)` window. Transient
//! statuses (429, 5xx) are retried with exponential backoff; credential failures
//! and empty results end the call immediately.

use crate::config::ApiConfig;
use crate::error::{LocalvoltsError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::reading::IntervalReading;
use crate::time::format_time;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

/// Path of the interval endpoint below the base URL
pub const INTERVAL_PATH: &str = "/v1/customer/interval";

/// Anything that can produce interval readings for a window
#[async_trait]
pub trait IntervalSource: Send + Sync {
    async fn fetch_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<IntervalReading>>;
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    Unauthorized,
    Forbidden,
    Retryable,
    Failed,
}

/// Classify a status code; 401 and 403 win over the generic rules
pub fn classify_status(status: StatusCode) -> ResponseClass {
    match status {
        StatusCode::UNAUTHORIZED => ResponseClass::Unauthorized,
        StatusCode::FORBIDDEN => ResponseClass::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => ResponseClass::Retryable,
        s if s.is_server_error() => ResponseClass::Retryable,
        s if s.is_success() => ResponseClass::Success,
        _ => ResponseClass::Failed,
    }
}

/// Attempt budget and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Decode a response body into readings
///
/// An empty list means the API accepted the request but knows nothing about
/// the meter, which is a configuration problem rather than a transient one.
/// Only a body that is not a JSON list is malformed; a row that is not an
/// object becomes an `Other` placeholder so positions and the rest of the
/// batch survive.
pub fn parse_intervals(body: &[u8]) -> Result<Vec<IntervalReading>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| LocalvoltsError::malformed(format!("invalid JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(LocalvoltsError::malformed(
            "expected list of intervals",
        ));
    };
    if items.is_empty() {
        return Err(LocalvoltsError::empty_result(
            "check that the NMI, partner ID and API key are correct",
        ));
    }
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value::<IntervalReading>(item).unwrap_or_default())
        .collect())
}

/// HTTP client for the interval endpoint
pub struct IntervalClient {
    http: reqwest::Client,
    url: String,
    nmi: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    logger: StructuredLogger,
}

impl IntervalClient {
    /// Build a client with its own connection pool
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::with_http_client(http, config)
    }

    /// Build a client on a pool owned by the caller
    ///
    /// The per-attempt timeout is then whatever `http` was built with.
    pub fn with_http_client(http: reqwest::Client, config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value("api_key", &format!("apikey {}", config.api_key.trim()))?,
        );
        headers.insert("partner", header_value("partner_id", config.partner_id.trim())?);
        headers.insert(
            USER_AGENT,
            header_value("user_agent", &format!("localvolts/{}", crate::APP_VERSION))?,
        );

        let logger = get_logger_with_context(LogContext::new("client").with_nmi(&config.nmi));
        Ok(Self {
            http,
            url: format!("{}{}", config.base_url.trim_end_matches('/'), INTERVAL_PATH),
            nmi: config.nmi.trim().to_string(),
            headers,
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
            logger,
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Full endpoint URL without query
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Client logger tagged with the requested window
    fn window_logger(&self, from: &str, to: &str) -> StructuredLogger {
        get_logger_with_context(
            self.logger
                .context()
                .clone()
                .with_field("window", format!("{}..{}", from, to)),
        )
    }

    async fn fetch(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<IntervalReading>> {
        let from_s = format_time(&from);
        let to_s = format_time(&to);
        let query = [
            ("NMI", self.nmi.as_str()),
            ("from", from_s.as_str()),
            ("to", to_s.as_str()),
        ];
        let attempts = self.retry.max_attempts;
        let logger = self.window_logger(&from_s, &to_s);

        for attempt in 1..=attempts {
            logger.debug(&format!(
                "Requesting intervals (attempt {}/{})",
                attempt, attempts
            ));
            let response = self
                .http
                .get(&self.url)
                .headers(self.headers.clone())
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    let err = LocalvoltsError::from(e);
                    logger.error(&format!("Request failed on attempt {}: {}", attempt, err));
                    err
                })?;

            let status = response.status();
            match classify_status(status) {
                ResponseClass::Unauthorized => {
                    logger.error("Unauthorized access: check your API key");
                    return Err(LocalvoltsError::auth("Unauthorized access: invalid API key"));
                }
                ResponseClass::Forbidden => {
                    logger.error("Forbidden: check your partner ID");
                    return Err(LocalvoltsError::forbidden("invalid partner ID"));
                }
                ResponseClass::Retryable => {
                    if attempt == attempts {
                        logger.error(&format!(
                            "API returned {}; giving up after {} attempts",
                            status.as_u16(),
                            attempts
                        ));
                        return Err(LocalvoltsError::rate_limited(status.as_u16(), attempts));
                    }
                    let delay = self.retry.delay_for(attempt);
                    logger.warn(&format!(
                        "API returned {}. Retrying in {:?} (attempt {}/{})",
                        status.as_u16(),
                        delay,
                        attempt,
                        attempts
                    ));
                    sleep(delay).await;
                }
                ResponseClass::Failed => {
                    logger.error(&format!("API returned {}", status.as_u16()));
                    return Err(LocalvoltsError::transport(format!(
                        "API returned {}",
                        status
                    )));
                }
                ResponseClass::Success => {
                    let body = response.bytes().await?;
                    let readings = parse_intervals(&body).inspect_err(|e| {
                        logger.warn(&format!("Unusable response: {}", e));
                    })?;
                    logger.debug(&format!("Received {} intervals", readings.len()));
                    return Ok(readings);
                }
            }
        }

        Err(LocalvoltsError::transport("no request attempted"))
    }
}

#[async_trait]
impl IntervalSource for IntervalClient {
    async fn fetch_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<IntervalReading>> {
        self.fetch(from, to).await
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        LocalvoltsError::validation(
            field.to_string(),
            "contains characters not allowed in a header".to_string(),
        )
    })?;
    header.set_sensitive(field != "user_agent");
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_order() {
        assert_eq!(classify_status(StatusCode::OK), ResponseClass::Success);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), ResponseClass::Success);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ResponseClass::Unauthorized
        );
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ResponseClass::Forbidden);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ResponseClass::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            ResponseClass::Retryable
        );
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ResponseClass::Failed);
        assert_eq!(
            classify_status(StatusCode::MOVED_PERMANENTLY),
            ResponseClass::Failed
        );
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));

        let instant = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        };
        assert_eq!(instant.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn parse_intervals_rejects_empty_and_non_lists() {
        assert!(matches!(
            parse_intervals(b"[]"),
            Err(LocalvoltsError::EmptyResult { .. })
        ));
        assert!(matches!(
            parse_intervals(br#"{"intervals": []}"#),
            Err(LocalvoltsError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_intervals(b"<html>"),
            Err(LocalvoltsError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn parse_intervals_tolerates_odd_rows() {
        let body = br#"[
            {"quality": "exp", "intervalEnd": "2023-01-01T00:05:00Z", "lastUpdate": "2023-01-01T00:05:30Z", "costsAll": 3},
            {"quality": "fcst", "intervalEnd": "2023-01-01T00:10:00Z", "lastUpdate": null, "costsAll": 9},
            {"quality": 7, "costsAll": 11},
            "not an object"
        ]"#;
        let readings = parse_intervals(body).unwrap();
        assert_eq!(readings.len(), 4);
        assert_eq!(readings[1].last_update, None);
        assert_eq!(readings[2].quality, crate::reading::Quality::Other);
        assert_eq!(readings[3], IntervalReading::default());
        assert_eq!(crate::quality::sum_cost(&readings), 3.0);
        assert!(crate::quality::select_final(&readings).is_some());
    }

    #[test]
    fn parse_intervals_keeps_order() {
        let body = br#"[
            {"quality": "fcst", "intervalEnd": "2023-01-01T00:10:00Z", "lastUpdate": "2023-01-01T00:06:00Z"},
            {"quality": "exp", "intervalEnd": "2023-01-01T00:05:00Z", "lastUpdate": "2023-01-01T00:05:30Z", "costsAll": "1.5"}
        ]"#;
        let readings = parse_intervals(body).unwrap();
        assert_eq!(readings.len(), 2);
        assert!(!readings[0].quality.is_final());
        assert_eq!(readings[1].cost(), Some(1.5));
    }

    #[test]
    fn client_builds_url_and_clamps_attempts() {
        let config = ApiConfig {
            api_key: "key".into(),
            partner_id: "partner".into(),
            nmi: "6001".into(),
            base_url: "http://127.0.0.1:9/".into(),
            max_attempts: 0,
            ..ApiConfig::default()
        };
        let client = IntervalClient::new(&config).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9/v1/customer/interval");
        assert_eq!(client.retry_policy().max_attempts, 1);
    }

    #[test]
    fn window_logger_carries_meter_and_window() {
        let config = ApiConfig {
            api_key: "key".into(),
            partner_id: "partner".into(),
            nmi: "6001".into(),
            ..ApiConfig::default()
        };
        let client = IntervalClient::new(&config).unwrap();
        let logger = client.window_logger("2023-01-01T00:00:00Z", "2023-01-01T00:05:00Z");
        assert_eq!(
            logger.format_fields(),
            "component=client,nmi=6001,window=2023-01-01T00:00:00Z..2023-01-01T00:05:00Z"
        );
    }

    #[test]
    fn header_values_reject_newlines() {
        let config = ApiConfig {
            api_key: "bad\nkey".into(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            IntervalClient::new(&config),
            Err(LocalvoltsError::Validation { .. })
        ));
    }
}
