use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One block found by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub observed_at: DateTime<Utc>,
}

impl Block {
    pub fn new(height: u64, observed_at: DateTime<Utc>) -> Self {
        Self {
            height,
            observed_at,
        }
    }

    /// Build from a height and a `ts` value in epoch milliseconds.
    pub fn from_millis(height: u64, ts_millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(ts_millis).map(|observed_at| Self::new(height, observed_at))
    }
}

/// Decode the newest block out of a `/api/pool/blocks` response body.
///
/// The endpoint returns an array ordered newest first. Only element 0 is
/// looked at; it must carry numeric `height` and `ts` fields. Anything else
/// is a schema error, never a partially filled block.
pub fn decode_latest(body: &str) -> Result<Block, SourceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SourceError::Schema(format!("body is not JSON: {e}")))?;

    let blocks = value
        .as_array()
        .ok_or_else(|| SourceError::Schema("expected a JSON array of blocks".into()))?;

    let latest = blocks
        .first()
        .ok_or_else(|| SourceError::Schema("block list is empty".into()))?;

    let height = latest
        .get("height")
        .ok_or_else(|| SourceError::Schema("missing field `height`".into()))
        .and_then(|v| non_negative_integer(v, "height"))?;

    let ts = latest
        .get("ts")
        .ok_or_else(|| SourceError::Schema("missing field `ts`".into()))
        .and_then(|v| non_negative_integer(v, "ts"))?;

    let ts = i64::try_from(ts)
        .map_err(|_| SourceError::Schema(format!("`ts` out of range: {ts}")))?;

    Block::from_millis(height, ts)
        .ok_or_else(|| SourceError::Schema(format!("`ts` out of range: {ts}")))
}

// JSON numbers may come through as floats (e.g. `100.0`); accept them only when integral.
fn non_negative_integer(value: &Value, field: &str) -> Result<u64, SourceError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        // `u64::MAX as f64` rounds up to 2^64, which does not fit.
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(SourceError::Schema(format!(
            "field `{field}` is not a non-negative integer: {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_err(body: &str) -> String {
        match decode_latest(body) {
            Err(SourceError::Schema(msg)) => msg,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn decodes_first_element() {
        let body = r#"[
            {"height": 101, "ts": 1700000600000, "hash": "ab"},
            {"height": 100, "ts": 1700000000000}
        ]"#;
        let block = decode_latest(body).unwrap();
        assert_eq!(block.height, 101);
        assert_eq!(block.observed_at.timestamp_millis(), 1_700_000_600_000);
    }

    #[test]
    fn accepts_integral_floats() {
        let block = decode_latest(r#"[{"height": 100.0, "ts": 1700000000000.0}]"#).unwrap();
        assert_eq!(block.height, 100);
        assert_eq!(block.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn empty_array_is_schema_error() {
        assert!(schema_err("[]").contains("empty"));
    }

    #[test]
    fn object_instead_of_array_is_schema_error() {
        assert!(schema_err(r#"{"height": 1, "ts": 2}"#).contains("array"));
    }

    #[test]
    fn invalid_json_is_schema_error() {
        assert!(schema_err("<html>502 Bad Gateway</html>").contains("not JSON"));
    }

    #[test]
    fn missing_fields_are_schema_errors() {
        assert!(schema_err(r#"[{"ts": 1700000000000}]"#).contains("height"));
        assert!(schema_err(r#"[{"height": 5}]"#).contains("ts"));
    }

    #[test]
    fn height_beyond_u64_is_schema_error() {
        let err = schema_err(r#"[{"height": 1.8446744073709552e19, "ts": 1700000000000}]"#);
        assert!(err.contains("height"));
    }

    #[test]
    fn wrong_types_are_schema_errors() {
        assert!(schema_err(r#"[{"height": "100", "ts": 1700000000000}]"#).contains("height"));
        assert!(schema_err(r#"[{"height": 100, "ts": null}]"#).contains("ts"));
        assert!(schema_err(r#"[{"height": -1, "ts": 1700000000000}]"#).contains("height"));
        assert!(schema_err(r#"[{"height": 1.5, "ts": 1700000000000}]"#).contains("height"));
        assert!(schema_err(r#"["not an object"]"#).contains("height"));
    }
}
