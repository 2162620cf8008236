//! Screener engine module.
//!
//! The orchestrator for one screening run:
//! `Init → LoadUniverse → Classify → RankByMarketCap → EvaluateValuation → Aggregate → Done`.
//!
//! Only `Init` (configuration) and `LoadUniverse` (no directory and no cache)
//! can abort a run. Per-company failures are absorbed by the batch executor
//! and every category is reported, possibly empty.

use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn, Instrument};

use besst_common::logging::generate_run_id;
use besst_common::Validate;

use super::batch::BatchExecutor;
use super::classifier::IndustryClassifier;
use super::config::ScreenerConfig;
use super::ranker::MarketCapRanker;
use super::report::ScreeningReport;
use super::valuation::ValuationEnricher;
use crate::clock::Clock;
use crate::data::{MarketDataProvider, SymbolCache, SymbolStore};
use crate::error::ScreenerError;

/// Stages of a screening run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    LoadUniverse,
    Classify,
    RankByMarketCap,
    EvaluateValuation,
    Aggregate,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::LoadUniverse => "load_universe",
            Self::Classify => "classify",
            Self::RankByMarketCap => "rank_by_market_cap",
            Self::EvaluateValuation => "evaluate_valuation",
            Self::Aggregate => "aggregate",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Screening orchestrator.
pub struct ScreenerEngine {
    config: ScreenerConfig,
    provider: Arc<dyn MarketDataProvider>,
    cache: SymbolCache,
    clock: Arc<dyn Clock>,
}

impl ScreenerEngine {
    pub fn new(
        config: ScreenerConfig,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn SymbolStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = SymbolCache::new(
            store,
            Arc::clone(&provider),
            Arc::clone(&clock),
            config.cache_ttl(),
        )
        .with_serve_stale_on_error(config.serve_stale_on_error);

        Self {
            config,
            provider,
            cache,
            clock,
        }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Run the full pipeline once.
    pub async fn run(&self) -> Result<ScreeningReport, ScreenerError> {
        let run_id = generate_run_id();
        let span = tracing::info_span!(
            "screening_run",
            run_id = %run_id,
            exchange = %self.config.exchange,
            provider = self.provider.name()
        );

        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: String) -> Result<ScreeningReport, ScreenerError> {
        let started_at = self.clock.now();
        let started = Instant::now();

        enter(PipelineStage::Init);
        self.config.validate()?;
        for (category, _) in self.config.reference_ratios.iter() {
            if !self.config.taxonomy.iter().any(|r| &r.name == category) {
                warn!(category = %category, "Reference ratio for a category not in the taxonomy");
            }
        }
        let deadline = self.config.run_budget().map(|budget| started + budget);
        let executor = BatchExecutor::from_config(&self.config.batch).with_deadline(deadline);
        let categories = self.config.category_names();

        enter(PipelineStage::LoadUniverse);
        let universe = self.cache.get_universe(&self.config.exchange).await?;

        enter(PipelineStage::Classify);
        let candidates = IndustryClassifier::new(&self.config.taxonomy).classify(&universe);
        let candidate_count = candidates.len();
        info!(
            universe = universe.len(),
            candidates = candidate_count,
            "Classified symbol directory"
        );

        enter(PipelineStage::RankByMarketCap);
        let ranker = MarketCapRanker::new(
            Arc::clone(&self.provider),
            executor.clone(),
            self.config.top_k,
        );
        let rankings = ranker.rank(candidates, &categories).await;

        enter(PipelineStage::EvaluateValuation);
        let enricher = ValuationEnricher::new(Arc::clone(&self.provider), executor);
        let category_reports = enricher
            .evaluate(rankings, &self.config.reference_ratios)
            .await;

        enter(PipelineStage::Aggregate);
        let report = ScreeningReport {
            run_id,
            exchange: self.config.exchange.clone(),
            started_at,
            completed_at: self.clock.now(),
            duration_secs: started.elapsed().as_secs_f64(),
            universe_size: universe.len(),
            candidate_count,
            categories: category_reports,
        };

        enter(PipelineStage::Done);
        info!(summary = %report.summary(), "Screening run complete");

        Ok(report)
    }
}

fn enter(stage: PipelineStage) {
    info!(stage = %stage, "Entering stage");
}
