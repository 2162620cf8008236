//! BESST Screener Library
//!
//! Screens an exchange's listed companies against industry P/E multiples and
//! flags sector leaders trading below their industry reference.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Symbol Cache │ → │ Classifier │ → │ Market-Cap   │ → │ Valuation &  │
//! │ (TTL, SQLite)│   │ (taxonomy) │   │ Ranker top-k │   │ Signal       │
//! └──────────────┘   └────────────┘   └──────────────┘   └──────────────┘
//!                                        batched, paced provider calls
//! ```
//!
//! Provider calls are made in groups of `batch.size`, with `batch.delay_ms`
//! between groups, to stay under the Finnhub free-tier rate limit.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod clock;
pub mod data;
pub mod error;
pub mod screener;

use std::sync::Arc;
use tracing::warn;

use besst_common::config::Config;
use besst_common::Validate;

use crate::clock::SystemClock;
use crate::data::{FinnhubAdapter, InMemorySymbolStore, SqliteSymbolStore, SymbolStore};
use crate::error::ScreenerError;
use crate::screener::{ScreenerConfig, ScreenerEngine, ScreeningReport};

/// Build a production engine: Finnhub provider, SQLite symbol cache, system clock.
///
/// Fails with `ScreenerError::Configuration` before any network call when the
/// screener configuration is invalid or no Finnhub token is configured.
pub fn build_engine(
    config: &Config,
    screener_config: &ScreenerConfig,
) -> Result<ScreenerEngine, ScreenerError> {
    screener_config.validate()?;

    let api_key = config.finnhub_api_key().ok_or_else(|| {
        ScreenerError::Configuration(
            "Finnhub API key is not set (FINNHUB_API_KEY or secrets.external.finnhub)".into(),
        )
    })?;

    let provider = Arc::new(FinnhubAdapter::with_base_url(
        api_key,
        screener_config.provider.base_url.clone(),
        screener_config.request_timeout(),
    ));

    let db_path = config.storage.resolved_db_path();
    let store: Arc<dyn SymbolStore> = match SqliteSymbolStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                db_path = %db_path.display(),
                error = %e,
                "Symbol cache database unavailable, caching in memory for this run"
            );
            Arc::new(InMemorySymbolStore::new())
        }
    };

    Ok(ScreenerEngine::new(
        screener_config.clone(),
        provider,
        store,
        Arc::new(SystemClock),
    ))
}

/// Run one screening pass with the production wiring.
pub async fn run_screening(
    config: &Config,
    screener_config: &ScreenerConfig,
) -> Result<ScreeningReport, ScreenerError> {
    build_engine(config, screener_config)?.run().await
}
