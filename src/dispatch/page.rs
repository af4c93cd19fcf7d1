//! Pagination metadata carried by list responses.

use serde_json::Value;

use crate::error::DecodeError;

/// Pagination fields of a list response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Entries in this page.
    pub count: u64,
    /// Entries across all pages. Servers omit it unless asked, so it
    /// defaults to zero.
    pub count_total: u64,
    /// Pages available at the current page size.
    pub pages: u64,
}

impl PageMeta {
    /// Strict extraction for responses that always paginate: `count` and
    /// `pages` are required, `count_total` falls back to zero.
    pub(crate) fn require(body: &Value) -> Result<Self, DecodeError> {
        Ok(Self {
            count: required_u64(body, "count")?,
            count_total: optional_u64(body, "count_total").unwrap_or(0),
            pages: required_u64(body, "pages")?,
        })
    }

    /// Lenient detection for endpoints that only sometimes paginate:
    /// metadata is present exactly when `count` is.
    pub(crate) fn detect(body: &Value) -> Option<Self> {
        let count = optional_u64(body, "count")?;
        Some(Self {
            count,
            count_total: optional_u64(body, "count_total").unwrap_or(0),
            pages: optional_u64(body, "pages").unwrap_or(0),
        })
    }
}

fn required_u64(body: &Value, field: &'static str) -> Result<u64, DecodeError> {
    match body.get(field) {
        None => Err(DecodeError::MissingField { field }),
        Some(value) => coerce_u64(value).ok_or(DecodeError::WrongType { field }),
    }
}

fn optional_u64(body: &Value, field: &str) -> Option<u64> {
    body.get(field).and_then(coerce_u64)
}

/// Servers send counters as numbers or numeric strings.
pub(crate) fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_reads_all_three_fields() {
        let meta = PageMeta::require(&json!({
            "count": 10,
            "count_total": 53,
            "pages": 6
        }))
        .unwrap();
        assert_eq!(
            meta,
            PageMeta {
                count: 10,
                count_total: 53,
                pages: 6
            }
        );
    }

    #[test]
    fn require_defaults_count_total_to_zero() {
        let meta = PageMeta::require(&json!({"count": 10, "pages": 1})).unwrap();
        assert_eq!(meta.count_total, 0);
    }

    #[test]
    fn require_coerces_numeric_strings() {
        let meta = PageMeta::require(&json!({"count": "7", "pages": "2"})).unwrap();
        assert_eq!(meta.count, 7);
        assert_eq!(meta.pages, 2);
    }

    #[test]
    fn require_rejects_a_missing_count() {
        let err = PageMeta::require(&json!({"pages": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "count" }));
    }

    #[test]
    fn require_rejects_missing_pages() {
        let err = PageMeta::require(&json!({"count": 3})).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "pages" }));
    }

    #[test]
    fn require_rejects_an_unusable_count() {
        let err = PageMeta::require(&json!({"count": true, "pages": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::WrongType { field: "count" }));
    }

    #[test]
    fn detect_needs_a_count() {
        assert!(PageMeta::detect(&json!({"status": "ok"})).is_none());
        let meta = PageMeta::detect(&json!({"count": 4})).unwrap();
        assert_eq!(meta.count, 4);
        assert_eq!(meta.pages, 0);
    }
}
