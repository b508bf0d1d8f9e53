//! Canonicalization of heterogeneous feature properties.
//!
//! Stations disagree on key casing (`Phase` vs `phase`), on alternate key
//! names (`phase` vs `phase_name`), on number encoding (`1200`, `"1,200"`,
//! `null`) and on category spelling. Everything here is total: a bad field
//! degrades to zero or `None`, it never fails the record.

use serde_json::{Map, Value};

/// The attribute bag of one feature.
pub type Properties = Map<String, Value>;

/// Grouping key used when a feature carries no usable phase.
pub const UNKNOWN: &str = "unknown";

/// Maps a value to `label` when it contains one of `needles` ([`classify`])
/// or equals one of them ([`classify_exact`]).
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub needles: &'static [&'static str],
    pub label: &'static str,
}

/// Returns the first usable value among `keys`, in order.
///
/// Each key is matched exactly first, then case-insensitively. Nulls and
/// blank strings count as absent so the next candidate gets a chance.
pub fn lookup<'a>(props: &'a Properties, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        props.get(*key).filter(|v| usable(v)).or_else(|| {
            props
                .iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(key) && usable(v))
                .map(|(_, v)| v)
        })
    })
}

fn usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Parses a JSON value as a float. Strings may carry thousands separators.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Numeric field; missing, null or unparsable values read as zero.
pub fn number(props: &Properties, keys: &[&str]) -> f64 {
    lookup(props, keys).and_then(parse_number).unwrap_or(0.0)
}

/// Count field, truncated toward zero.
pub fn count(props: &Properties, keys: &[&str]) -> i64 {
    number(props, keys).trunc() as i64
}

/// Trimmed, case-folded text value, or `None` if blank or missing.
pub fn label(props: &Properties, keys: &[&str]) -> Option<String> {
    let value = lookup(props, keys)?;
    let text = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Phase grouping key: like [`label`] but never absent.
pub fn phase(props: &Properties, keys: &[&str]) -> String {
    label(props, keys).unwrap_or_else(|| UNKNOWN.to_string())
}

/// Applies `rules` in order and returns the first matching label.
///
/// A value that matches nothing yields `None`; callers exclude such features
/// from category-keyed metrics rather than bucketing them.
pub fn classify(raw: &str, rules: &[CategoryRule]) -> Option<&'static str> {
    let folded = raw.trim().to_lowercase();
    if folded.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.needles.iter().any(|n| folded.contains(n)))
        .map(|rule| rule.label)
}

/// Like [`classify`], but the trimmed, case-folded value must equal a needle.
/// Composite values such as `"camera check post"` match nothing.
pub fn classify_exact(raw: &str, rules: &[CategoryRule]) -> Option<&'static str> {
    let folded = raw.trim().to_lowercase();
    rules
        .iter()
        .find(|rule| rule.needles.iter().any(|n| *n == folded))
        .map(|rule| rule.label)
}
