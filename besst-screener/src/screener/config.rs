//! Screener configuration module.
//!
//! Read from the `screener` section of the merged configuration document
//! (`config.json` + `screener.json`). Every field has a default, so an empty
//! section yields the standard US screen.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use besst_common::{Validate, ValidationError, ValidationResult};

use super::classifier::CategoryRule;
use super::valuation::ReferenceRatioTable;
use crate::data::DEFAULT_FINNHUB_BASE_URL;

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Configuration for one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Exchange whose symbol directory is screened (Finnhub exchange code)
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Symbol directory cache TTL in hours
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// Serve a stale directory when the refresh fails
    #[serde(default = "default_true")]
    pub serve_stale_on_error: bool,

    /// Companies kept per category after market-cap ranking
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Batch pacing for provider calls
    #[serde(default)]
    pub batch: BatchConfig,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional wall-clock budget for the enrichment stages
    #[serde(default)]
    pub run_budget_secs: Option<u64>,

    /// Provider endpoint settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Industry taxonomy, in first-match order
    #[serde(default = "default_taxonomy")]
    pub taxonomy: Vec<CategoryRule>,

    /// Reference P/E per category
    #[serde(default = "default_reference_ratios")]
    pub reference_ratios: ReferenceRatioTable,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            cache_ttl_hours: default_cache_ttl_hours(),
            serve_stale_on_error: default_true(),
            top_k: default_top_k(),
            batch: BatchConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            run_budget_secs: None,
            provider: ProviderConfig::default(),
            taxonomy: default_taxonomy(),
            reference_ratios: default_reference_ratios(),
        }
    }
}

impl ScreenerConfig {
    /// Read the `screener` section of a merged configuration document.
    pub fn from_document(document: &Value) -> Result<Self> {
        match document.get("screener") {
            Some(section) => serde_json::from_value(section.clone())
                .context("Failed to parse screener configuration"),
            None => Ok(Self::default()),
        }
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }

    /// Category names in declared order.
    pub fn category_names(&self) -> Vec<String> {
        self.taxonomy.iter().map(|r| r.name.clone()).collect()
    }
}

fn default_exchange() -> String {
    "US".to_string()
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Batch Configuration
// ============================================================================

/// Pacing for provider calls: groups of `size` run concurrently, with
/// `delay_ms` between groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            delay_ms: default_batch_delay_ms(),
        }
    }
}

impl BatchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    2000
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_FINNHUB_BASE_URL.to_string()
}

// ============================================================================
// Default Taxonomy
// ============================================================================

fn default_taxonomy() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("Banking", &["bank"]),
        // Must precede Electric Utilities: both match regulated electric
        CategoryRule::new("Transmission", &["regulated electric", "electric utilities"])
            .with_required_description("transmission"),
        CategoryRule::new("Electric Utilities", &["regulated electric", "electric utilities"]),
        CategoryRule::new("Water Utilities", &["regulated water", "water utilities"]),
        CategoryRule::new("Insurance", &["insurance"]),
    ]
}

fn default_reference_ratios() -> ReferenceRatioTable {
    [
        ("Banking", 13.50),
        ("Transmission", 22.50),
        ("Electric Utilities", 22.50),
        ("Water Utilities", 23.00),
        ("Insurance", 18.60),
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Validation
// ============================================================================

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.exchange.trim().is_empty() {
            errors.push(ValidationError::missing("screener.exchange"));
        }

        if self.taxonomy.is_empty() {
            errors.push(ValidationError::missing("screener.taxonomy"));
        }

        let mut seen = HashSet::new();
        for rule in &self.taxonomy {
            if rule.name.trim().is_empty() {
                errors.push(ValidationError::invalid(
                    "screener.taxonomy",
                    "category name must not be blank",
                ));
            } else if !seen.insert(rule.name.as_str()) {
                errors.push(ValidationError::invalid(
                    "screener.taxonomy",
                    format!("duplicate category '{}'", rule.name),
                ));
            }

            if !rule.match_keywords.iter().any(|k| !k.trim().is_empty()) {
                errors.push(ValidationError::invalid(
                    format!("screener.taxonomy.{}", rule.name),
                    "at least one non-blank keyword is required",
                ));
            }
        }

        if self.reference_ratios.is_empty() {
            errors.push(ValidationError::missing("screener.reference_ratios"));
        }

        for (category, ratio) in self.reference_ratios.iter() {
            if !ratio.is_finite() || *ratio < 0.0 {
                errors.push(ValidationError::invalid(
                    format!("screener.reference_ratios.{}", category),
                    format!("{} is not a finite non-negative ratio", ratio),
                ));
            }
        }

        if self.top_k == 0 {
            errors.push(ValidationError::invalid("screener.top_k", "must be greater than 0"));
        }

        if self.batch.size == 0 {
            errors.push(ValidationError::invalid(
                "screener.batch.size",
                "must be greater than 0",
            ));
        }

        if self.provider.base_url.trim().is_empty() {
            errors.push(ValidationError::missing("screener.provider.base_url"));
        }

        ValidationError::collect(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ScreenerConfig::default();
        assert_eq!(config.exchange, "US");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.batch.size, 5);
        assert_eq!(config.batch.delay(), Duration::from_secs(2));
        assert_eq!(config.cache_ttl(), chrono::Duration::hours(24));
        assert!(config.run_budget().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transmission_declared_before_electric() {
        let names = ScreenerConfig::default().category_names();
        let transmission = names.iter().position(|n| n == "Transmission").unwrap();
        let electric = names.iter().position(|n| n == "Electric Utilities").unwrap();
        assert!(transmission < electric);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = ScreenerConfig::from_document(&json!({ "observability": {} })).unwrap();
        assert_eq!(config.taxonomy.len(), 5);
        assert_eq!(config.reference_ratios.ratio_for("Water Utilities"), 23.0);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let doc = json!({
            "screener": {
                "top_k": 2,
                "batch": { "delay_ms": 0 },
                "taxonomy": [
                    { "name": "Bank", "match_keywords": ["bank"] }
                ],
                "reference_ratios": { "Bank": 13.5 }
            }
        });
        let config = ScreenerConfig::from_document(&doc).unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.batch.size, 5);
        assert_eq!(config.batch.delay_ms, 0);
        assert_eq!(config.category_names(), vec!["Bank".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_errors() {
        let config = ScreenerConfig {
            top_k: 0,
            batch: BatchConfig {
                size: 0,
                delay_ms: 0,
            },
            reference_ratios: ReferenceRatioTable::default(),
            ..Default::default()
        };
        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected three errors, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_and_blank_rules_rejected() {
        let config = ScreenerConfig {
            taxonomy: vec![
                CategoryRule::new("Bank", &["bank"]),
                CategoryRule::new("Bank", &["  "]),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate category"));
        assert!(err.contains("non-blank keyword"));
    }

    #[test]
    fn test_negative_ratio_rejected() {
        let config = ScreenerConfig {
            reference_ratios: [("Banking", -1.0)].into_iter().collect(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
