//! Report generation module for screening results.
//!
//! Generates reports in two formats:
//! - JSON (response envelope for programmatic use)
//! - Markdown (human-readable tables)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::valuation::ScreeningResult;

const SUCCESS_MESSAGE: &str = "Stock analysis completed";
const SIGNAL_YES: &str = "✔";
const SIGNAL_NO: &str = "✘";

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// JSON format (machine-readable)
    Json,
    /// Markdown format (human-readable)
    Markdown,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Screening Report
// ============================================================================

/// Results of one category, in ranked order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: String,
    pub reference_pe_ratio: f64,
    pub results: Vec<ScreeningResult>,
}

/// Complete output of one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub run_id: String,
    pub exchange: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Symbols in the exchange directory
    pub universe_size: usize,
    /// Symbols that matched a category
    pub candidate_count: usize,
    /// Categories in taxonomy order
    pub categories: Vec<CategoryReport>,
}

impl ScreeningReport {
    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == name)
    }

    pub fn total_results(&self) -> usize {
        self.categories.iter().map(|c| c.results.len()).sum()
    }

    pub fn signal_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.results.iter())
            .filter(|r| r.signal)
            .count()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} symbols, {} candidates, {} reported, {} below industry P/E ({:.1}s)",
            self.universe_size,
            self.candidate_count,
            self.total_results(),
            self.signal_count(),
            self.duration_secs
        )
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Presentation row: numbers as two-decimal strings, signal as a mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedRow {
    pub name: String,
    pub ticker: String,
    pub price: String,
    #[serde(rename = "peRatio")]
    pub pe_ratio: String,
    #[serde(rename = "industryPERatio")]
    pub industry_pe_ratio: String,
    pub signal: String,
}

impl From<&ScreeningResult> for FormattedRow {
    fn from(result: &ScreeningResult) -> Self {
        Self {
            name: result.name.clone(),
            ticker: result.ticker.clone(),
            price: format!("{:.2}", result.price),
            pe_ratio: format!("{:.2}", result.pe_ratio),
            industry_pe_ratio: format!("{:.2}", result.reference_pe_ratio),
            signal: if result.signal { SIGNAL_YES } else { SIGNAL_NO }.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedCategory {
    pub category: String,
    #[serde(rename = "industryPERatio")]
    pub industry_pe_ratio: String,
    pub companies: Vec<FormattedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub run_id: String,
    pub exchange: String,
    pub generated_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub categories: Vec<FormattedCategory>,
}

/// Success/failure envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl ScreeningResponse {
    pub fn completed(report: &ScreeningReport) -> Self {
        let categories = report
            .categories
            .iter()
            .map(|c| FormattedCategory {
                category: c.category.clone(),
                industry_pe_ratio: format!("{:.2}", c.reference_pe_ratio),
                companies: c.results.iter().map(FormattedRow::from).collect(),
            })
            .collect();

        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(ResponseData {
                run_id: report.run_id.clone(),
                exchange: report.exchange.clone(),
                generated_at: report.completed_at,
                duration_secs: report.duration_secs,
                categories,
            }),
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("Error analyzing stocks: {}", error),
            data: None,
        }
    }

    /// Generate the response in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    /// Generate JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Generate markdown tables, one per category.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Industry P/E Screen\n\n");

        let Some(data) = &self.data else {
            md.push_str(&format!("**{}**\n", self.message));
            return md;
        };

        md.push_str(&format!(
            "**Run**: {}\n**Exchange**: {}\n**Generated**: {}\n**Duration**: {:.1}s\n\n",
            data.run_id,
            data.exchange,
            data.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            data.duration_secs
        ));

        for category in &data.categories {
            md.push_str(&format!(
                "## {} (industry P/E {})\n\n",
                category.category, category.industry_pe_ratio
            ));

            if category.companies.is_empty() {
                md.push_str("_No companies qualified._\n\n");
                continue;
            }

            md.push_str("| Name | Ticker | Price | P/E | Industry P/E | Signal |\n");
            md.push_str("|------|--------|-------|-----|--------------|--------|\n");
            for row in &category.companies {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    row.name.replace('|', "\\|"),
                    row.ticker,
                    row.price,
                    row.pe_ratio,
                    row.industry_pe_ratio,
                    row.signal
                ));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str(&format!("_{}_\n", self.message));

        md
    }

    /// Save the response to a file, adding an extension when missing.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let content = self.generate(format);
        let extension = match format {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        };

        let file_path = if path.extension().is_none() {
            path.with_extension(extension)
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        std::fs::write(&file_path, content)
            .with_context(|| format!("Failed to write report to {}", file_path.display()))?;

        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn create_test_report() -> ScreeningReport {
        let started = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        ScreeningReport {
            run_id: "run-1".into(),
            exchange: "US".into(),
            started_at: started,
            completed_at: started + chrono::Duration::seconds(12),
            duration_secs: 12.0,
            universe_size: 3,
            candidate_count: 3,
            categories: vec![
                CategoryReport {
                    category: "Bank".into(),
                    reference_pe_ratio: 13.5,
                    results: vec![
                        ScreeningResult {
                            name: "Big Bank".into(),
                            ticker: "BB".into(),
                            price: 101.457,
                            pe_ratio: 10.0,
                            reference_pe_ratio: 13.5,
                            signal: true,
                        },
                        ScreeningResult {
                            name: "Small Bank".into(),
                            ticker: "SB".into(),
                            price: 20.0,
                            pe_ratio: 20.004,
                            reference_pe_ratio: 13.5,
                            signal: false,
                        },
                    ],
                },
                CategoryReport {
                    category: "Utilities".into(),
                    reference_pe_ratio: 0.0,
                    results: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("MD".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("telegram".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_report_counts() {
        let report = create_test_report();
        assert_eq!(report.total_results(), 2);
        assert_eq!(report.signal_count(), 1);
        assert!(report.category("Utilities").unwrap().results.is_empty());
        assert!(report.summary().contains("1 below industry P/E"));
    }

    #[test]
    fn test_formatted_rows() {
        let response = ScreeningResponse::completed(&create_test_report());
        assert!(response.success);
        assert_eq!(response.message, "Stock analysis completed");

        let data = response.data.unwrap();
        let bank = &data.categories[0];
        assert_eq!(bank.industry_pe_ratio, "13.50");
        assert_eq!(bank.companies[0].price, "101.46");
        assert_eq!(bank.companies[0].signal, "✔");
        assert_eq!(bank.companies[1].pe_ratio, "20.00");
        assert_eq!(bank.companies[1].signal, "✘");
    }

    #[test]
    fn test_json_uses_presentation_keys() {
        let json = ScreeningResponse::completed(&create_test_report()).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let row = &value["data"]["categories"][0]["companies"][0];
        assert_eq!(row["peRatio"], "10.00");
        assert_eq!(row["industryPERatio"], "13.50");
    }

    #[test]
    fn test_failure_envelope() {
        let response = ScreeningResponse::failed("Configuration error: FINNHUB_API_KEY is not set");
        assert!(!response.success);
        assert!(response.message.starts_with("Error analyzing stocks: "));

        let json: serde_json::Value = serde_json::from_str(&response.to_json()).unwrap();
        assert!(json.get("data").is_none());
        assert!(response.to_markdown().contains("Error analyzing stocks"));
    }

    #[test]
    fn test_markdown_generation() {
        let md = ScreeningResponse::completed(&create_test_report()).to_markdown();
        assert!(md.contains("## Bank (industry P/E 13.50)"));
        assert!(md.contains("| Big Bank | BB | 101.46 | 10.00 | 13.50 | ✔ |"));
        assert!(md.contains("## Utilities (industry P/E 0.00)"));
        assert!(md.contains("_No companies qualified._"));
    }

    #[test]
    fn test_save_to_file_adds_extension() {
        let dir = tempdir().unwrap();
        let response = ScreeningResponse::completed(&create_test_report());
        let path = response
            .save_to_file(&dir.path().join("out").join("screen"), ReportFormat::Markdown)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "md");
        assert!(std::fs::read_to_string(path).unwrap().contains("Big Bank"));
    }
}
