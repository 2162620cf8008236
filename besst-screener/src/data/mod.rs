//! Market data layer.
//!
//! Provides the provider abstraction, the Finnhub adapter, the TTL symbol
//! cache and its SQLite persistence.

mod cache;
mod finnhub;
mod local_storage;
mod provider;

pub use cache::{CachedSymbolSet, InMemorySymbolStore, SymbolCache, SymbolStore};
pub use finnhub::{FinnhubAdapter, DEFAULT_FINNHUB_BASE_URL};
pub use local_storage::SqliteSymbolStore;
pub use provider::{MarketDataProvider, ProviderError};

use serde::{Deserialize, Serialize};

/// One entry of an exchange's symbol directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Ticker (e.g., "JPM")
    pub symbol: String,
    /// Human-readable company name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free-text industry label assigned by the provider
    #[serde(default)]
    pub industry_tag: Option<String>,
    /// Free-text business description
    #[serde(default)]
    pub description: Option<String>,
}

impl SymbolRecord {
    /// Create a record with only a ticker.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: None,
            industry_tag: None,
            description: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the industry tag.
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry_tag = Some(industry.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name to show in reports, falling back to the ticker.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.symbol)
    }
}

/// Latest quote for a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Current trading price, when the provider reports one
    pub current_price: Option<f64>,
}

/// Valuation metrics for a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    /// Annual price-to-earnings ratio
    pub pe_ratio: Option<f64>,
}
