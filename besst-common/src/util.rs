//! Utility functions for BESST services.

use regex::Regex;
use std::sync::OnceLock;

/// Sanitize a string for safe logging (redact sensitive patterns).
///
/// Market data providers commonly carry the API token as a `token=` query
/// parameter, so URLs embedded in transport errors must go through here.
pub fn sanitize_for_log(s: &str) -> String {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            (r"(?i)([?&](?:token|apikey|api_key)=)[^&\s)]+", "${1}***REDACTED***"),
            (r"(?i)(api[_-]?key|apikey)[=:]\s*\S{20,}", "$1=***REDACTED***"),
            (r"(?i)(x-finnhub-token)\s*[=:]\s*\S+", "$1: ***REDACTED***"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    });

    let mut result = s.to_string();
    for (re, replacement) in patterns {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_query_token() {
        let input = "error sending request for url (https://finnhub.io/api/v1/quote?symbol=JPM&token=abc123secret)";
        let output = sanitize_for_log(input);
        assert!(!output.contains("abc123secret"));
        assert!(output.contains("symbol=JPM"));
        assert!(output.contains("token=***REDACTED***"));
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        assert_eq!(sanitize_for_log("connection refused"), "connection refused");
    }
}
