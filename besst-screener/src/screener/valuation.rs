//! Valuation enrichment and signal evaluation.
//!
//! For every ranked survivor the quote and valuation metrics are fetched
//! concurrently. A company needs a positive price to be reported; a missing
//! or failed P/E is reported as 0 and never signals.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::batch::BatchExecutor;
use super::ranker::{CategoryRanking, RankedCandidate};
use super::report::CategoryReport;
use crate::data::MarketDataProvider;
use crate::error::{EnrichmentFailure, EnrichmentStage};

// ============================================================================
// Reference Ratios
// ============================================================================

/// Reference P/E per category. Unknown categories read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceRatioTable(HashMap<String, f64>);

impl ReferenceRatioTable {
    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn ratio_for(&self, category: &str) -> f64 {
        self.get(category).unwrap_or(0.0)
    }

    pub fn insert(&mut self, category: impl Into<String>, ratio: f64) {
        self.0.insert(category.into(), ratio);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ReferenceRatioTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ============================================================================
// Screening Result
// ============================================================================

/// Final report row for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub name: String,
    pub ticker: String,
    pub price: f64,
    pub pe_ratio: f64,
    pub reference_pe_ratio: f64,
    pub signal: bool,
}

/// True when the P/E is positive and strictly below the reference.
pub fn compute_signal(pe_ratio: f64, reference: f64) -> bool {
    pe_ratio > 0.0 && pe_ratio < reference
}

// ============================================================================
// Valuation Enricher
// ============================================================================

pub struct ValuationEnricher {
    provider: Arc<dyn MarketDataProvider>,
    executor: BatchExecutor,
}

impl ValuationEnricher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, executor: BatchExecutor) -> Self {
        Self { provider, executor }
    }

    /// Evaluate every ranking, keeping category and ranked order.
    pub async fn evaluate(
        &self,
        rankings: Vec<CategoryRanking>,
        reference_ratios: &ReferenceRatioTable,
    ) -> Vec<CategoryReport> {
        let mut reports = Vec::with_capacity(rankings.len());

        for ranking in rankings {
            let reference = reference_ratios.ratio_for(&ranking.category);
            if reference_ratios.get(&ranking.category).is_none() {
                warn!(
                    category = %ranking.category,
                    "No reference ratio configured, no company can signal"
                );
            }

            let total = ranking.candidates.len();
            let outcome = self
                .executor
                .run_batched(ranking.candidates, |ranked| self.enrich(ranked, reference))
                .await;

            let failed = outcome.failures.len();
            let results = outcome.into_results();
            info!(
                category = %ranking.category,
                ranked = total,
                failed,
                signals = results.iter().filter(|r| r.signal).count(),
                "Valuation evaluated"
            );

            reports.push(CategoryReport {
                category: ranking.category,
                reference_pe_ratio: reference,
                results,
            });
        }

        reports
    }

    async fn enrich(
        &self,
        ranked: RankedCandidate,
        reference: f64,
    ) -> Result<ScreeningResult, EnrichmentFailure> {
        let record = &ranked.candidate.record;
        let symbol = record.symbol.as_str();

        let (quote, valuation) = tokio::join!(
            self.provider.get_quote(symbol),
            self.provider.get_valuation(symbol)
        );

        let quote = quote.map_err(|e| EnrichmentFailure::new(symbol, EnrichmentStage::Valuation, e))?;
        let price = quote
            .current_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                EnrichmentFailure::new(symbol, EnrichmentStage::Valuation, "no usable price")
            })?;

        let pe_ratio = match valuation {
            Ok(metrics) => metrics.pe_ratio.filter(|pe| pe.is_finite()).unwrap_or(0.0),
            Err(e) => {
                warn!(symbol, error = %e, "Valuation metrics unavailable, treating P/E as missing");
                0.0
            }
        };

        Ok(ScreeningResult {
            name: record.name().to_string(),
            ticker: record.symbol.clone(),
            price,
            pe_ratio,
            reference_pe_ratio: reference,
            signal: compute_signal(pe_ratio, reference),
        })
    }
}
