//! Finnhub API adapter.
//!
//! # API Documentation
//! <https://finnhub.io/docs/api>
//!
//! # Endpoints
//! - `/stock/symbol` - exchange symbol directory
//! - `/stock/profile2` - company profile (market capitalization)
//! - `/quote` - latest quote
//! - `/stock/metric` - basic financials (valuation metrics)
//!
//! # Authentication
//! The API token travels as the `token` query parameter. Error messages are
//! passed through `sanitize_for_log` before they leave this module, because
//! reqwest includes the request URL in its errors.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use besst_common::util::sanitize_for_log;

use super::provider::{MarketDataProvider, ProviderError};
use super::{Quote, SymbolRecord, ValuationMetrics};

// ============================================================================
// Constants
// ============================================================================

/// Finnhub API base URL
pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";

const SYMBOL_ENDPOINT: &str = "/stock/symbol";
const PROFILE_ENDPOINT: &str = "/stock/profile2";
const QUOTE_ENDPOINT: &str = "/quote";
const METRIC_ENDPOINT: &str = "/stock/metric";

/// Metric keys tried in order when resolving the P/E ratio.
const PE_METRIC_KEYS: &[&str] = &["peAnnual", "peTTM", "peBasicExclExtraTTM"];

/// Retry hint when Finnhub answers 429 without a Retry-After header
const RATE_LIMIT_RETRY_SECS: u64 = 60;

// ============================================================================
// Finnhub API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubSymbol {
    symbol: String,
    #[serde(default)]
    display_symbol: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    finnhub_industry: Option<String>,
}

impl FinnhubSymbol {
    /// Name resolution: display symbol, then description, then raw ticker.
    fn into_record(self) -> SymbolRecord {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let display_name = non_blank(&self.display_symbol).or_else(|| non_blank(&self.description));

        SymbolRecord {
            symbol: self.symbol,
            display_name,
            industry_tag: self.finnhub_industry.filter(|i| !i.trim().is_empty()),
            description: self.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinnhubProfile {
    #[serde(default)]
    market_capitalization: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// Current price
    #[serde(default)]
    c: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FinnhubMetrics {
    #[serde(default)]
    metric: Option<Map<String, Value>>,
}

/// Read a number that may arrive as a JSON number or a numeric string.
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

// ============================================================================
// Finnhub Adapter
// ============================================================================

/// Finnhub adapter for US listed equities.
pub struct FinnhubAdapter {
    /// API token
    api_key: String,
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl FinnhubAdapter {
    /// Create an adapter against the public Finnhub endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_FINNHUB_BASE_URL, Duration::from_secs(30))
    }

    /// Create an adapter with a custom base URL and request timeout.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    timeout_secs = timeout.as_secs_f64(),
                    "Failed to build Finnhub HTTP client, falling back to defaults without request timeout"
                );
                reqwest::Client::new()
            });

        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Issue a GET and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);

        debug!(url = %url, params = ?params, "Fetching from Finnhub");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(sanitize_for_log(&e.to_string()))
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Auth(format!("HTTP {}", status.as_u16())));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .or(Some(RATE_LIMIT_RETRY_SECS));
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::DataNotAvailable(format!(
                "{} has no data for {:?}",
                endpoint, params
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!(
                "HTTP {}: {}",
                status,
                sanitize_for_log(&body)
            )));
        }

        response.json::<T>().await.map_err(|e| {
            ProviderError::InvalidResponse(sanitize_for_log(&format!(
                "Failed to parse {} response: {}",
                endpoint, e
            )))
        })
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubAdapter {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    async fn list_symbols(&self, exchange: &str) -> Result<Vec<SymbolRecord>, ProviderError> {
        let symbols: Vec<FinnhubSymbol> = self
            .get_json(SYMBOL_ENDPOINT, &[("exchange", exchange)])
            .await?;

        debug!(exchange, count = symbols.len(), "Fetched symbol directory");

        Ok(symbols
            .into_iter()
            .filter(|s| !s.symbol.trim().is_empty())
            .map(FinnhubSymbol::into_record)
            .collect())
    }

    async fn get_market_cap(&self, symbol: &str) -> Result<Option<f64>, ProviderError> {
        let profile: FinnhubProfile = self
            .get_json(PROFILE_ENDPOINT, &[("symbol", symbol)])
            .await?;

        Ok(profile.market_capitalization.as_ref().and_then(value_as_f64))
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let quote: FinnhubQuote = self.get_json(QUOTE_ENDPOINT, &[("symbol", symbol)]).await?;

        Ok(Quote {
            current_price: quote.c.as_ref().and_then(value_as_f64),
        })
    }

    async fn get_valuation(&self, symbol: &str) -> Result<ValuationMetrics, ProviderError> {
        let metrics: FinnhubMetrics = self
            .get_json(
                METRIC_ENDPOINT,
                &[("symbol", symbol), ("metric", "valuation")],
            )
            .await?;

        let metric = metrics.metric.unwrap_or_default();
        let pe_ratio = PE_METRIC_KEYS
            .iter()
            .find_map(|key| metric.get(*key).and_then(value_as_f64));

        Ok(ValuationMetrics { pe_ratio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(value_as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&Value::Null), None);
    }

    #[test]
    fn test_symbol_into_record_prefers_display_symbol() {
        let raw: FinnhubSymbol = serde_json::from_value(json!({
            "symbol": "BRK.B",
            "displaySymbol": "BRK-B",
            "description": "BERKSHIRE HATHAWAY INC-CL B",
            "finnhubIndustry": ""
        }))
        .unwrap();
        let record = raw.into_record();
        assert_eq!(record.display_name.as_deref(), Some("BRK-B"));
        assert_eq!(record.industry_tag, None);
    }

    #[test]
    fn test_symbol_into_record_falls_back_to_description() {
        let raw: FinnhubSymbol = serde_json::from_value(json!({
            "symbol": "JPM",
            "description": "JPMORGAN CHASE & CO",
            "finnhubIndustry": "Banking"
        }))
        .unwrap();
        let record = raw.into_record();
        assert_eq!(record.name(), "JPMORGAN CHASE & CO");
        assert_eq!(record.industry_tag.as_deref(), Some("Banking"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let adapter =
            FinnhubAdapter::with_base_url("tok", "http://localhost:1/", Duration::from_secs(1));
        assert_eq!(adapter.base_url, "http://localhost:1");
        assert_eq!(adapter.name(), "finnhub");
    }
}
