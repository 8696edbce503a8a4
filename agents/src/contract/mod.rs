//! Output contracts: per-artifact-kind validation of raw model responses.
//!
//! Every kind follows the same shape: extract a JSON payload via the parse
//! cascade, normalize each item with a kind-specific rule set, clamp and
//! reorder, and fail only when nothing usable survives. Partial item loss is
//! success with a reduced count.

pub mod evaluation;
pub mod flashcard;
pub mod flowchart;
pub mod parse;
pub mod quiz;

use serde_json::Value;

/// Runs `normalize` over the array stored under `list_key`, keeping the
/// surviving records in input order. A missing or non-array value yields an
/// empty list; emptiness is judged by the caller.
pub(crate) fn collect_records<T>(
    payload: &Value,
    list_key: &str,
    normalize: impl Fn(&Value) -> Option<T>,
) -> Vec<T> {
    payload
        .get(list_key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize).collect())
        .unwrap_or_default()
}

/// Trimmed string content of `item[key]`, accepting numbers and booleans the
/// way a lenient generator emits them. `None` for missing/null/other shapes.
pub(crate) fn string_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Like [`string_field`] but rejects values that trim to nothing.
pub(crate) fn required_field(item: &Value, key: &str) -> Option<String> {
    string_field(item, key).filter(|text| !text.is_empty())
}

/// Integer coercion tolerating numeric strings and floats.
pub(crate) fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Float coercion tolerating numeric strings.
pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_field_trims_and_coerces_scalars() {
        let item = json!({"a": "  padded  ", "b": 7, "c": true, "d": null, "e": []});
        assert_eq!(string_field(&item, "a").as_deref(), Some("padded"));
        assert_eq!(string_field(&item, "b").as_deref(), Some("7"));
        assert_eq!(string_field(&item, "c").as_deref(), Some("true"));
        assert_eq!(string_field(&item, "d"), None);
        assert_eq!(string_field(&item, "e"), None);
        assert_eq!(string_field(&item, "missing"), None);
    }

    #[test]
    fn required_field_rejects_blank_text() {
        let item = json!({"front": "   "});
        assert_eq!(required_field(&item, "front"), None);
    }

    #[test]
    fn numeric_coercions_accept_strings() {
        assert_eq!(coerce_i64(&json!("4")), Some(4));
        assert_eq!(coerce_i64(&json!(2.9)), Some(2));
        assert_eq!(coerce_i64(&json!("four")), None);
        assert_eq!(coerce_f64(&json!("87.5")), Some(87.5));
        assert_eq!(coerce_f64(&json!(true)), None);
    }

    #[test]
    fn collect_records_handles_missing_lists() {
        let payload = json!({"other": 1});
        let records: Vec<String> =
            collect_records(&payload, "questions", |item| item.as_str().map(String::from));
        assert!(records.is_empty());
    }
}
