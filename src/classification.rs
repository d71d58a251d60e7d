//! Canonicalization of hierarchical classification codes.
//!
//! Source documents encode the same hierarchical position in at least two
//! incompatible compact notations (`351.1`, `3511`) besides the dotted form
//! (`3.5.1.1`). Bucket matching downstream requires one canonical shape.

use once_cell::sync::Lazy;
use regex::Regex;

static DOTTED_FORM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-3]\.\d").unwrap());

static COMPACT_WITH_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([1-3])(\d)(\d)\.(\d+)$").unwrap());

static COMPACT_FOUR_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([1-3])(\d)(\d)(\d)$").unwrap());

static BUCKET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.\d{1,3})").unwrap());

/// Rewrites compact classification spellings into the dotted form:
/// `351.1` becomes `3.5.1.1`, `3511` becomes `3.5.1.1`. Already-dotted and
/// unrecognized inputs pass through unchanged.
pub fn normalize_classification(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if DOTTED_FORM.is_match(raw) {
        return raw.to_string();
    }

    if let Some(c) = COMPACT_WITH_TAIL.captures(raw) {
        return format!("{}.{}.{}.{}", &c[1], &c[2], &c[3], &c[4]);
    }

    if let Some(c) = COMPACT_FOUR_DIGITS.captures(raw) {
        return format!("{}.{}.{}.{}", &c[1], &c[2], &c[3], &c[4]);
    }

    raw.to_string()
}

/// Coarse two-segment grouping key (`3.5.1.1` yields `3.5`), used for
/// fallback aggregation when keyword matching finds nothing.
pub fn bucket_key(classification: Option<&str>) -> Option<String> {
    let normalized = normalize_classification(classification?);
    if normalized.is_empty() {
        return None;
    }
    BUCKET_PREFIX
        .captures(&normalized)
        .map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_with_tail() {
        assert_eq!(normalize_classification("351.1"), "3.5.1.1");
        assert_eq!(normalize_classification("371.1"), "3.7.1.1");
        assert_eq!(normalize_classification("381.12"), "3.8.1.12");
    }

    #[test]
    fn test_compact_four_digits() {
        assert_eq!(normalize_classification("3511"), "3.5.1.1");
        assert_eq!(normalize_classification("3711"), "3.7.1.1");
    }

    #[test]
    fn test_dotted_is_idempotent() {
        assert_eq!(normalize_classification("3.5.1.1"), "3.5.1.1");
        assert_eq!(
            normalize_classification(&normalize_classification("351.1")),
            "3.5.1.1"
        );
        assert_eq!(normalize_classification("1.1"), "1.1");
        assert_eq!(normalize_classification("2.1.01"), "2.1.01");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(normalize_classification("9999"), "9999");
        assert_eq!(normalize_classification("abc"), "abc");
        assert_eq!(normalize_classification("  "), "");
    }

    #[test]
    fn test_bucket_key() {
        assert_eq!(bucket_key(Some("3.5.1.1")).as_deref(), Some("3.5"));
        assert_eq!(bucket_key(Some("351.1")).as_deref(), Some("3.5"));
        assert_eq!(bucket_key(Some("1.1")).as_deref(), Some("1.1"));
        assert_eq!(bucket_key(Some("abc")), None);
        assert_eq!(bucket_key(None), None);
    }
}
