//! Industry classification.
//!
//! Maps symbol records onto the configured taxonomy. A record matches a rule
//! when its industry tag contains any of the rule's keywords
//! (case-insensitive) and, for composite rules, its description contains the
//! required substring. Rules are tried in declared order and the first match
//! wins.

use serde::{Deserialize, Serialize};

use crate::data::SymbolRecord;

/// One taxonomy bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub match_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_description_substring: Option<String>,
}

impl CategoryRule {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            match_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            requires_description_substring: None,
        }
    }

    pub fn with_required_description(mut self, substring: impl Into<String>) -> Self {
        self.requires_description_substring = Some(substring.into());
        self
    }
}

/// A symbol assigned to a category.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCompany {
    pub record: SymbolRecord,
    pub category: String,
}

impl CandidateCompany {
    pub fn symbol(&self) -> &str {
        &self.record.symbol
    }
}

/// Rule with lowercased needles.
#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    keywords: Vec<String>,
    description: Option<String>,
}

impl CompiledRule {
    fn matches(&self, industry: &str, description: &str) -> bool {
        self.keywords.iter().any(|k| industry.contains(k.as_str()))
            && self
                .description
                .as_deref()
                .map_or(true, |needle| description.contains(needle))
    }
}

/// First-match industry classifier.
#[derive(Debug, Clone)]
pub struct IndustryClassifier {
    rules: Vec<CompiledRule>,
}

impl IndustryClassifier {
    pub fn new(rules: &[CategoryRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                name: rule.name.clone(),
                // A blank keyword would match every tag
                keywords: rule
                    .match_keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                description: rule
                    .requires_description_substring
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_lowercase),
            })
            .collect();

        Self { rules }
    }

    /// Category of a single record, if any.
    pub fn category_for(&self, record: &SymbolRecord) -> Option<&str> {
        let industry = record.industry_tag.as_deref()?.to_lowercase();
        let description = record
            .description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&industry, &description))
            .map(|rule| rule.name.as_str())
    }

    /// Classify a symbol list, preserving input order. Unmatched symbols are dropped.
    pub fn classify(&self, symbols: &[SymbolRecord]) -> Vec<CandidateCompany> {
        symbols
            .iter()
            .filter_map(|record| {
                self.category_for(record).map(|category| CandidateCompany {
                    record: record.clone(),
                    category: category.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utility_rules() -> Vec<CategoryRule> {
        vec![
            CategoryRule::new("Banking", &["bank"]),
            CategoryRule::new("Transmission", &["regulated electric"])
                .with_required_description("transmission"),
            CategoryRule::new("Electric Utilities", &["regulated electric"]),
        ]
    }

    #[test]
    fn test_mixed_case_tag_matches() {
        let classifier = IndustryClassifier::new(&utility_rules());
        let record = SymbolRecord::new("JPM").with_industry("BANKS—Diversified");
        assert_eq!(classifier.category_for(&record), Some("Banking"));
    }

    #[test]
    fn test_composite_rule_requires_description() {
        let classifier = IndustryClassifier::new(&utility_rules());

        let without = SymbolRecord::new("DUK")
            .with_industry("Utilities—Regulated Electric")
            .with_description("Generates and distributes power");
        let with = SymbolRecord::new("ITC")
            .with_industry("Utilities—Regulated Electric")
            .with_description("Owns high-voltage Transmission lines");

        assert_eq!(classifier.category_for(&without), Some("Electric Utilities"));
        assert_eq!(classifier.category_for(&with), Some("Transmission"));
    }

    #[test]
    fn test_composite_rule_alone_excludes_missing_description() {
        let rules = vec![CategoryRule::new("Transmission", &["regulated electric"])
            .with_required_description("transmission")];
        let classifier = IndustryClassifier::new(&rules);
        let record = SymbolRecord::new("DUK").with_industry("Utilities—Regulated Electric");
        assert!(classifier.classify(&[record]).is_empty());
    }

    #[test]
    fn test_first_match_wins_and_order_preserved() {
        let rules = vec![
            CategoryRule::new("Insurance", &["insurance"]),
            CategoryRule::new("Banking", &["bank", "insurance"]),
        ];
        let symbols = vec![
            SymbolRecord::new("BAC").with_industry("Banks"),
            SymbolRecord::new("XYZ"),
            SymbolRecord::new("MET").with_industry("Bank Insurance"),
            SymbolRecord::new("AAPL").with_industry("Technology"),
        ];

        let candidates = IndustryClassifier::new(&rules).classify(&symbols);
        let got: Vec<_> = candidates
            .iter()
            .map(|c| (c.symbol(), c.category.as_str()))
            .collect();
        assert_eq!(got, vec![("BAC", "Banking"), ("MET", "Insurance")]);
    }

    #[test]
    fn test_blank_keyword_does_not_match_everything() {
        let rules = vec![CategoryRule::new("Anything", &[" "])];
        let record = SymbolRecord::new("AAPL").with_industry("Technology");
        assert!(IndustryClassifier::new(&rules).category_for(&record).is_none());
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(
            tags in proptest::collection::vec("[A-Za-z ]{0,20}", 0..30)
        ) {
            let symbols: Vec<SymbolRecord> = tags
                .iter()
                .enumerate()
                .map(|(i, tag)| SymbolRecord::new(format!("S{}", i)).with_industry(tag.clone()))
                .collect();
            let classifier = IndustryClassifier::new(&utility_rules());

            let first = classifier.classify(&symbols);
            let second = classifier.classify(&symbols);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= symbols.len());
        }

        #[test]
        fn keyword_match_ignores_case(prefix in "[a-z]{0,8}", upper in any::<bool>()) {
            let tag = if upper {
                format!("{}BANK", prefix.to_uppercase())
            } else {
                format!("{}bank", prefix)
            };
            let record = SymbolRecord::new("X").with_industry(tag);
            let classifier = IndustryClassifier::new(&utility_rules());
            prop_assert_eq!(classifier.category_for(&record), Some("Banking"));
        }
    }
}
