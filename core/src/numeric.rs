//! Coercion of untrusted numeric input (form fields, persisted JSON, model
//! output) into `Option<f64>`. `None` means "unknown" and is never zero.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse free-form text as a finite number.
///
/// Surrounding whitespace is ignored. Empty input, non-numeric text and
/// non-finite values (`inf`, `NaN`) all yield `None`.
#[must_use]
pub fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Coerce a JSON value to a finite number: numbers pass through, strings are
/// parsed, everything else is unknown.
#[must_use]
pub fn to_number_or_null(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Serde adapter for `Option<f64>` fields that must never fail to load.
///
/// Use with `#[serde(default, deserialize_with = "numeric::lenient")]`.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(to_number_or_null(&value))
}
