//! Sentinel-aware serde helpers for model-produced records.
//!
//! Model output marks an absent fact with the literal `"N/A"`. Internally each
//! such leaf is an `Option`; these helpers translate at the serde boundary and
//! tolerate the shape drift typical of LLM-generated JSON (strings where lists
//! are expected, bare strings where objects are expected, and so on).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The single sentinel for "no evidence in the source".
pub const NOT_AVAILABLE: &str = "N/A";

/// True for the sentinel itself, empty strings and whitespace.
pub fn is_sentinel(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
}

/// Render a JSON value as plain text. Sentinels, nulls and empty containers
/// are absent; lists are joined with `", "`.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if is_sentinel(s) => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Render a JSON value as a list of texts, dropping sentinel items.
pub fn value_to_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        other => value_to_text(other).into_iter().collect(),
    }
}

/// Records that can be recovered from a bare string where an object was
/// expected, e.g. `"enrollment_status": "Recruiting"`.
pub trait FromText: Sized {
    fn from_text(_text: String) -> Option<Self> {
        None
    }
}

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// A loosely typed leaf: numbers stay numbers, everything else is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Integer coercion: numeric values pass through, all-digit text is
    /// parsed, anything else (`"12a"`, `"N/A"`, fractions) is absent.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Integer(n) => Some(*n),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Scalar::Float(_) => None,
            Scalar::Text(s) => {
                let t = s.trim();
                if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) {
                    t.parse().ok()
                } else {
                    None
                }
            }
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Integer(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            other => value_to_text(other).map(Scalar::Text),
        }
    }
}

/// `Option<String>` leaf: `None` is written as `"N/A"`.
pub mod text {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(NOT_AVAILABLE))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value_to_text(&value))
    }
}

/// `Option<Scalar>` leaf: `None` is written as `"N/A"`.
pub mod scalar {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Scalar>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => v.serialize(s),
            None => s.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Scalar>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(Scalar::from_value(&value))
    }
}

// ──────────────────────────────────────────────
// Containers
// ──────────────────────────────────────────────

/// List of texts; a single string becomes a one-item list.
pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_to_strings(&value))
}

/// List of records; items that cannot be read are skipped.
pub fn objects<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromText,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().filter_map(item_from_value).collect(),
        single => item_from_value(single).into_iter().collect(),
    })
}

/// Nested record; a bare string fills the record's primary field, anything
/// unreadable yields the empty record.
pub fn object<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromText + Default,
{
    let value = Value::deserialize(d)?;
    Ok(item_from_value(value).unwrap_or_default())
}

fn item_from_value<T: DeserializeOwned + FromText>(value: Value) -> Option<T> {
    match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        Value::String(s) if !is_sentinel(&s) => T::from_text(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Site {
        #[serde(default, with = "text")]
        facility: Option<String>,
        #[serde(default, with = "scalar")]
        enrolled: Option<Scalar>,
    }

    impl FromText for Site {
        fn from_text(text: String) -> Option<Self> {
            Some(Self { facility: Some(text), enrolled: None })
        }
    }

    #[derive(Debug, Default, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "strings")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "objects")]
        sites: Vec<Site>,
        #[serde(default, deserialize_with = "object")]
        main: Site,
    }

    #[test]
    fn sentinel_detection() {
        assert!(is_sentinel("N/A"));
        assert!(is_sentinel(" n/a "));
        assert!(is_sentinel(""));
        assert!(!is_sentinel("NA-123"));
    }

    #[test]
    fn text_leaf_round_trips_sentinel() {
        let site: Site = serde_json::from_value(json!({"facility": "N/A", "enrolled": "N/A"})).unwrap();
        assert_eq!(site.facility, None);
        assert_eq!(site.enrolled, None);
        let out = serde_json::to_value(&site).unwrap();
        assert_eq!(out, json!({"facility": "N/A", "enrolled": "N/A"}));
    }

    #[test]
    fn missing_leaves_default_to_absent() {
        let site: Site = serde_json::from_value(json!({})).unwrap();
        assert_eq!(site, Site::default());
    }

    #[test]
    fn numbers_become_text_in_text_leaves() {
        let site: Site = serde_json::from_value(json!({"facility": 42})).unwrap();
        assert_eq!(site.facility.as_deref(), Some("42"));
    }

    #[test]
    fn scalar_integer_coercion() {
        assert_eq!(Scalar::Text("42".into()).as_integer(), Some(42));
        assert_eq!(Scalar::Text("12a".into()).as_integer(), None);
        assert_eq!(Scalar::Text("N/A".into()).as_integer(), None);
        assert_eq!(Scalar::Integer(7).as_integer(), Some(7));
        assert_eq!(Scalar::Float(7.0).as_integer(), Some(7));
        assert_eq!(Scalar::Float(7.5).as_integer(), None);
    }

    #[test]
    fn strings_accept_single_value_and_drop_sentinels() {
        let h: Holder = serde_json::from_value(json!({"tags": "EGFR"})).unwrap();
        assert_eq!(h.tags, vec!["EGFR"]);
        let h: Holder = serde_json::from_value(json!({"tags": ["EGFR", "N/A", "ALK"]})).unwrap();
        assert_eq!(h.tags, vec!["EGFR", "ALK"]);
        let h: Holder = serde_json::from_value(json!({"tags": "N/A"})).unwrap();
        assert!(h.tags.is_empty());
    }

    #[test]
    fn objects_skip_unreadable_items() {
        let h: Holder = serde_json::from_value(json!({
            "sites": [{"facility": "Mayo"}, 17, "City Hospital", null, "N/A"]
        }))
        .unwrap();
        let names: Vec<_> = h.sites.iter().filter_map(|s| s.facility.as_deref()).collect();
        assert_eq!(names, vec!["Mayo", "City Hospital"]);
    }

    #[test]
    fn object_from_bare_string() {
        let h: Holder = serde_json::from_value(json!({"main": "Recruiting site"})).unwrap();
        assert_eq!(h.main.facility.as_deref(), Some("Recruiting site"));
        let h: Holder = serde_json::from_value(json!({"main": [1, 2]})).unwrap();
        assert_eq!(h.main, Site::default());
    }

    #[test]
    fn value_to_text_joins_lists() {
        assert_eq!(value_to_text(&json!(["Phase 1", "Phase 2"])).as_deref(), Some("Phase 1, Phase 2"));
        assert_eq!(value_to_text(&json!([])), None);
        assert_eq!(value_to_text(&json!(true)).as_deref(), Some("true"));
    }
}
