/// Rate limit detection: scan failed agent output for rate limit indicators.
///
/// Looks for patterns like:
/// - JSON: `"error":"rate_limit"` or `"error": "rate_limit"`
/// - Text: `usage limit`, `hit your limit`, `resets.*UTC`, `429` status lines (case-insensitive)
///
/// Detection only; the failure is still terminal for the run.
use regex::Regex;
use std::sync::LazyLock;

static RATE_LIMIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""error"\s*:\s*"rate_limit""#,
        r"(?i)usage limit",
        r"(?i)hit your limit",
        r"(?i)resets.*UTC",
        r"(?i)rate[_ ]limit(ed)?",
        r"\b429\b.*(?i)too many requests",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Check text content for rate limit patterns.
pub fn detect_rate_limit_in_text(text: &str) -> bool {
    for pattern in RATE_LIMIT_PATTERNS.iter() {
        if pattern.is_match(text) {
            tracing::debug!(pattern = %pattern, "rate limit pattern matched");
            return true;
        }
    }
    false
}
