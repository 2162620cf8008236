//! Screening error types.
//!
//! Only two failures abort a run: a configuration problem detected before any
//! network call, and an exchange directory that can be neither fetched nor
//! served from cache. Everything that goes wrong for a single company is an
//! [`EnrichmentFailure`], which is logged and dropped.

use std::fmt;
use thiserror::Error;

use besst_common::ValidationError;

/// Fatal screening error.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Symbol directory unavailable for exchange {exchange}: {cause}")]
    UpstreamUnavailable { exchange: String, cause: String },
}

impl ScreenerError {
    /// Whether the failure was detected before any upstream call.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<ValidationError> for ScreenerError {
    fn from(err: ValidationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Pipeline step an enrichment call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStage {
    MarketCap,
    Valuation,
}

impl fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarketCap => write!(f, "market_cap"),
            Self::Valuation => write!(f, "valuation"),
        }
    }
}

/// Per-company failure. Never aborts a run.
#[derive(Debug, Clone, Error)]
#[error("{stage} lookup failed for {symbol}: {cause}")]
pub struct EnrichmentFailure {
    pub symbol: String,
    pub stage: EnrichmentStage,
    pub cause: String,
}

impl EnrichmentFailure {
    pub fn new(symbol: impl Into<String>, stage: EnrichmentStage, cause: impl fmt::Display) -> Self {
        Self {
            symbol: symbol.into(),
            stage,
            cause: cause.to_string(),
        }
    }
}
