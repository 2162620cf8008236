//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the screening pipeline consumes, so
//! the Finnhub adapter can be swapped for a mock in tests.

use async_trait::async_trait;
use std::fmt;

use super::{Quote, SymbolRecord, ValuationMetrics};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Authentication error (invalid token, expired)
    Auth(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested symbol
    DataNotAvailable(String),
    /// Response body did not match the expected shape
    InvalidResponse(String),
    /// Internal provider error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is transient (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// Every call is independent; the pipeline paces calls itself through the
/// batch executor, so implementations should not add their own throttling.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "finnhub")
    fn name(&self) -> &'static str;

    /// Fetch the full symbol directory of an exchange.
    async fn list_symbols(&self, exchange: &str) -> Result<Vec<SymbolRecord>, ProviderError>;

    /// Fetch market capitalization. `Ok(None)` means the provider has no figure.
    async fn get_market_cap(&self, symbol: &str) -> Result<Option<f64>, ProviderError>;

    /// Fetch the latest quote.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, ProviderError>;

    /// Fetch valuation metrics.
    async fn get_valuation(&self, symbol: &str) -> Result<ValuationMetrics, ProviderError>;
}
