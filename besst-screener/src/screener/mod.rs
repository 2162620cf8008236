//! Industry P/E screening pipeline.
//!
//! - `classifier`: maps symbols onto the industry taxonomy
//! - `batch`: paced, bounded-concurrency enrichment
//! - `ranker`: market-cap ranking per category
//! - `valuation`: price and P/E enrichment, signal evaluation
//! - `engine`: orchestrates one run
//! - `report`: presentation (JSON, markdown)

pub mod batch;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod ranker;
pub mod report;
pub mod valuation;

pub use batch::{BatchExecutor, BatchOutcome};
pub use classifier::{CandidateCompany, CategoryRule, IndustryClassifier};
pub use config::{BatchConfig, ProviderConfig, ScreenerConfig};
pub use engine::{PipelineStage, ScreenerEngine};
pub use ranker::{select_top, CategoryRanking, MarketCapRanker, RankedCandidate};
pub use report::{CategoryReport, ReportFormat, ScreeningReport, ScreeningResponse};
pub use valuation::{compute_signal, ReferenceRatioTable, ScreeningResult, ValuationEnricher};
