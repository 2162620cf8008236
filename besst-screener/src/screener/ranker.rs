//! Market-cap ranking.
//!
//! Fetches market capitalization for every candidate of a category through
//! the batch executor, drops candidates without a positive figure, and keeps
//! the `top_k` largest. Ties keep their original directory order.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::batch::BatchExecutor;
use super::classifier::CandidateCompany;
use crate::data::MarketDataProvider;
use crate::error::{EnrichmentFailure, EnrichmentStage};

/// Candidate with a known market capitalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: CandidateCompany,
    pub market_cap: f64,
}

/// Ranked survivors of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRanking {
    pub category: String,
    pub candidates: Vec<RankedCandidate>,
}

/// Keep positive caps, sort descending (stable), truncate to `top_k`.
pub fn select_top(mut ranked: Vec<RankedCandidate>, top_k: usize) -> Vec<RankedCandidate> {
    ranked.retain(|r| r.market_cap.is_finite() && r.market_cap > 0.0);
    ranked.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
    ranked.truncate(top_k);
    ranked
}

pub struct MarketCapRanker {
    provider: Arc<dyn MarketDataProvider>,
    executor: BatchExecutor,
    top_k: usize,
}

impl MarketCapRanker {
    pub fn new(provider: Arc<dyn MarketDataProvider>, executor: BatchExecutor, top_k: usize) -> Self {
        Self {
            provider,
            executor,
            top_k,
        }
    }

    /// Rank candidates per category. Output follows `categories` order and has
    /// one entry per category, empty when nothing survived.
    pub async fn rank(
        &self,
        candidates: Vec<CandidateCompany>,
        categories: &[String],
    ) -> Vec<CategoryRanking> {
        let mut grouped: HashMap<String, Vec<CandidateCompany>> = HashMap::new();
        for candidate in candidates {
            grouped
                .entry(candidate.category.clone())
                .or_default()
                .push(candidate);
        }

        let mut rankings = Vec::with_capacity(categories.len());
        for category in categories {
            let members = grouped.remove(category).unwrap_or_default();
            let candidates = self.rank_category(category, members).await;
            rankings.push(CategoryRanking {
                category: category.clone(),
                candidates,
            });
        }

        for (category, members) in grouped {
            debug!(category = %category, count = members.len(), "Ignoring candidates of unknown category");
        }

        rankings
    }

    async fn rank_category(
        &self,
        category: &str,
        members: Vec<CandidateCompany>,
    ) -> Vec<RankedCandidate> {
        if members.is_empty() {
            debug!(category, "No candidates to rank");
            return Vec::new();
        }

        let total = members.len();
        let outcome = self
            .executor
            .run_batched(members, |candidate| self.fetch_market_cap(candidate))
            .await;

        let failed = outcome.failures.len();
        let top = select_top(outcome.into_results(), self.top_k);

        info!(
            category,
            candidates = total,
            failed,
            selected = top.len(),
            "Ranked by market cap"
        );

        top
    }

    async fn fetch_market_cap(
        &self,
        candidate: CandidateCompany,
    ) -> Result<RankedCandidate, EnrichmentFailure> {
        let symbol = candidate.symbol().to_string();

        match self.provider.get_market_cap(&symbol).await {
            Ok(Some(market_cap)) if market_cap.is_finite() && market_cap > 0.0 => {
                Ok(RankedCandidate {
                    candidate,
                    market_cap,
                })
            }
            Ok(Some(market_cap)) => Err(EnrichmentFailure::new(
                symbol,
                EnrichmentStage::MarketCap,
                format!("non-positive market cap {}", market_cap),
            )),
            Ok(None) => Err(EnrichmentFailure::new(
                symbol,
                EnrichmentStage::MarketCap,
                "market cap not reported",
            )),
            Err(e) => Err(EnrichmentFailure::new(symbol, EnrichmentStage::MarketCap, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SymbolRecord;

    fn ranked(symbol: &str, market_cap: f64) -> RankedCandidate {
        RankedCandidate {
            candidate: CandidateCompany {
                record: SymbolRecord::new(symbol),
                category: "Bank".into(),
            },
            market_cap,
        }
    }

    fn symbols(ranked: &[RankedCandidate]) -> Vec<&str> {
        ranked.iter().map(|r| r.candidate.symbol()).collect()
    }

    #[test]
    fn test_ties_keep_input_order() {
        let input = vec![
            ranked("A", 50.0),
            ranked("B", 200.0),
            ranked("C", 10.0),
            ranked("D", 200.0),
        ];
        let top = select_top(input, 2);
        assert_eq!(symbols(&top), vec!["B", "D"]);
    }

    #[test]
    fn test_fewer_than_top_k_returns_all() {
        let top = select_top(vec![ranked("A", 1.0), ranked("B", 3.0)], 5);
        assert_eq!(symbols(&top), vec!["B", "A"]);
    }

    #[test]
    fn test_non_positive_and_nan_dropped() {
        let input = vec![
            ranked("A", 0.0),
            ranked("B", -4.0),
            ranked("C", f64::NAN),
            ranked("D", 7.0),
        ];
        assert_eq!(symbols(&select_top(input, 5)), vec!["D"]);
    }
}
