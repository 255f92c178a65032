//! Normalization of the heterogeneous result payloads returned by the
//! governance evaluation service. The payload shape varies across service
//! versions (aggregates, per-record lists, nested wrappers), so extraction is
//! format-agnostic: known slots first, then a depth-first search for a number.

use serde_json::Value;

/// Keys that may hold the metric value inside a nested payload.
const SEARCH_KEYS: &[&str] = &["score", "value", "confidence", "prob", "probability"];

/// Rejects NaN, scales percentage-style values in (1, 100] down to a ratio
/// and clamps the rest into [0, 1].
pub fn safe_number(v: f64) -> Option<f64> {
    if v.is_nan() {
        return None;
    }
    let v = if v > 1.0 && v <= 100.0 { v / 100.0 } else { v };
    Some(v.clamp(0.0, 1.0))
}

/// Numeric coercion for a single JSON value. Numeric strings count: some
/// service versions serialize scores as strings.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(safe_number),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(safe_number),
        _ => None,
    }
}

/// Depth-first search for a metric value inside an arbitrarily nested
/// payload. Named slots win over the first number found in child values.
pub fn search_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(_) | Value::String(_) => coerce_number(value),
        Value::Object(map) => {
            for key in SEARCH_KEYS {
                if let Some(v) = map.get(*key).and_then(coerce_number) {
                    return Some(v);
                }
            }
            map.values().find_map(search_number)
        }
        Value::Array(items) => items.iter().find_map(search_number),
        _ => None,
    }
}

/// Extracts the value for input row `idx` from one metric's result payload.
///
/// Handles, in order: a single-aggregate list wrapper, a
/// `record_level_metrics` list (one entry per input row), a plain aggregate
/// `value`, and finally the generic search.
pub fn record_value(payload: &Value, idx: usize) -> Option<f64> {
    let agg = match payload {
        Value::Array(items) => items.first()?,
        other => other,
    };
    if let Some(per_record) = agg.get("record_level_metrics").and_then(Value::as_array) {
        let item = per_record.get(idx)?;
        if let Some(v) = item.get("value").and_then(coerce_number) {
            return Some(v);
        }
        return search_number(item);
    }
    if let Some(v) = agg.get("value").and_then(coerce_number) {
        return Some(v);
    }
    search_number(agg)
}

/// Value extraction for one named entry of a `metrics_result` list. For a
/// single-row evaluation the direct aggregate `value` wins over
/// `record_level_metrics[0]`.
pub fn metric_object_value(item: &Value) -> Option<f64> {
    if let Some(v) = item.get("value").and_then(coerce_number) {
        return Some(v);
    }
    record_value(item, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_number_scales_and_clamps() {
        assert_eq!(safe_number(0.5), Some(0.5));
        assert_eq!(safe_number(82.0), Some(0.82));
        assert_eq!(safe_number(1.0), Some(1.0));
        assert_eq!(safe_number(250.0), Some(1.0));
        assert_eq!(safe_number(-0.2), Some(0.0));
        assert_eq!(safe_number(f64::NAN), None);
    }

    #[test]
    fn coerce_number_accepts_numeric_strings() {
        assert_eq!(coerce_number(&json!("0.75")), Some(0.75));
        assert_eq!(coerce_number(&json!(" 42 ")), Some(0.42));
        assert_eq!(coerce_number(&json!("not a number")), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn search_prefers_named_slots() {
        let payload = json!({"meta": {"count": 4.0}, "score": 0.9});
        assert_eq!(search_number(&payload), Some(0.9));

        let nested = json!({"outer": [{"inner": {"confidence": 0.6}}]});
        assert_eq!(search_number(&nested), Some(0.6));

        assert_eq!(search_number(&json!({"label": "ok"})), None);
    }

    #[test]
    fn record_value_per_record_shape() {
        let payload = json!([{
            "name": "faithfulness",
            "record_level_metrics": [{"value": 0.3}, {"value": 0.7}]
        }]);
        assert_eq!(record_value(&payload, 0), Some(0.3));
        assert_eq!(record_value(&payload, 1), Some(0.7));
        assert_eq!(record_value(&payload, 2), None);
    }

    #[test]
    fn record_value_aggregate_shape() {
        let payload = json!([{"name": "hap", "value": 0.1}]);
        assert_eq!(record_value(&payload, 0), Some(0.1));
        // Aggregates apply to every row index.
        assert_eq!(record_value(&payload, 3), Some(0.1));
    }

    #[test]
    fn metric_object_prefers_direct_value() {
        let both = json!({
            "name": "violence",
            "value": 0.4,
            "record_level_metrics": [{"value": 0.9}]
        });
        assert_eq!(metric_object_value(&both), Some(0.4));

        let per_record_only = json!({"record_level_metrics": [{"value": 0.9}]});
        assert_eq!(metric_object_value(&per_record_only), Some(0.9));

        let nested_only = json!({"details": {"score": 0.2}});
        assert_eq!(metric_object_value(&nested_only), Some(0.2));
    }

    #[test]
    fn record_value_falls_back_to_search() {
        let payload = json!({"details": {"probability": "0.55"}});
        assert_eq!(record_value(&payload, 0), Some(0.55));
        assert_eq!(record_value(&json!([]), 0), None);
    }
}
