//! Safe lookup of dot-separated paths in a registry document tree.
//!
//! A missing key, an out-of-range index or a type mismatch at any hop yields
//! `None`; lookups never fail.

use serde_json::Value;

/// Resolve `path` (e.g. `"protocolSection.identificationModule.nctId"`).
///
/// Numeric segments index into arrays: `"locations.0.facility"`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Non-empty string at `path`, trimmed.
pub fn resolve_str(root: &Value, path: &str) -> Option<String> {
    resolve(root, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Integer at `path`. Whole-valued floats and digit-only strings are
/// accepted; signs, fractions and other text are not.
pub fn resolve_i64(root: &Value, path: &str) -> Option<i64> {
    match resolve(root, path)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let t = s.trim();
            if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) {
                t.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn resolve_bool(root: &Value, path: &str) -> Option<bool> {
    resolve(root, path).and_then(Value::as_bool)
}

/// Array items at `path`; empty when absent or not an array.
pub fn resolve_array<'a>(root: &'a Value, path: &str) -> &'a [Value] {
    resolve(root, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String items of the array at `path`; non-string items are skipped.
pub fn resolve_strings(root: &Value, path: &str) -> Vec<String> {
    resolve_array(root, path)
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
