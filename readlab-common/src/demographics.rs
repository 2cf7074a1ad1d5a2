//! Demographics normalization
//!
//! The demographics form submits a free-form payload whose field names track
//! the questionnaire (q1_age, q2_gender, ...). Known fields are trimmed and
//! coerced into a typed record; everything unrecognized is preserved in an
//! extras map for forward compatibility with questionnaire revisions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized demographics record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub prolific_id: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub citizenship: Option<Vec<String>>,
    pub ethnicity: Option<String>,
    pub education: Option<String>,
    pub first_language: Option<String>,
    /// Unrecognized questionnaire fields, kept verbatim
    #[serde(default)]
    pub extras: Map<String, Value>,
}

fn as_trimmed_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_age(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(as_trimmed_string).collect()),
        Value::Null => None,
        other => as_trimmed_string(other).map(|s| vec![s]),
    }
}

/// Normalize a raw demographics payload
///
/// Accepts anything; never fails. Questionnaire keys consumed by a known
/// field do not reappear in extras.
pub fn normalize_demographics(raw: &Map<String, Value>) -> Demographics {
    let mut used: Vec<&str> = vec!["prolific_id"];
    let mut out = Demographics {
        prolific_id: raw.get("prolific_id").and_then(as_trimmed_string),
        ..Demographics::default()
    };

    if let Some(v) = raw.get("q1_age") {
        out.age = as_age(v);
        used.push("q1_age");
    }

    out.gender = raw.get("q2_gender").and_then(as_trimmed_string);
    used.push("q2_gender");

    if let Some(v) = raw.get("citizenship") {
        out.citizenship = as_string_list(v);
        used.push("citizenship");
    }

    // Ethnicity: the "Other" option carries its free text in a second field
    let mut ethnicity = raw.get("q4_ethnicity").and_then(as_trimmed_string);
    if ethnicity.as_deref() == Some("Multiple ethnicity / Other") {
        if let Some(other) = raw.get("q4_ethnicity_other").and_then(as_trimmed_string) {
            ethnicity = Some(other);
        }
    }
    out.ethnicity = ethnicity;
    used.push("q4_ethnicity");
    used.push("q4_ethnicity_other");

    out.education = raw.get("q5_education").and_then(as_trimmed_string);
    used.push("q5_education");

    // First language: derived from the English-first question
    out.first_language = match raw.get("q6_english_first").and_then(as_trimmed_string).as_deref() {
        Some("Yes") => Some("English".to_string()),
        Some("No") => raw.get("q7_native_language").and_then(as_trimmed_string),
        _ => None,
    };
    used.push("q6_english_first");
    used.push("q7_native_language");

    out.extras = raw
        .iter()
        .filter(|(k, _)| !used.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_known_fields_normalized() {
        let raw = payload(json!({
            "prolific_id": " P123 ",
            "q1_age": "29",
            "q2_gender": "Woman",
            "citizenship": ["US", "CA"],
            "q4_ethnicity": "Asian",
            "q5_education": "Bachelor's degree",
            "q6_english_first": "Yes",
        }));
        let demo = normalize_demographics(&raw);
        assert_eq!(demo.prolific_id.as_deref(), Some("P123"));
        assert_eq!(demo.age, Some(29));
        assert_eq!(demo.gender.as_deref(), Some("Woman"));
        assert_eq!(demo.citizenship, Some(vec!["US".to_string(), "CA".to_string()]));
        assert_eq!(demo.ethnicity.as_deref(), Some("Asian"));
        assert_eq!(demo.first_language.as_deref(), Some("English"));
        assert!(demo.extras.is_empty());
    }

    #[test]
    fn test_ethnicity_other_merges_free_text() {
        let raw = payload(json!({
            "q4_ethnicity": "Multiple ethnicity / Other",
            "q4_ethnicity_other": "Hapa",
        }));
        let demo = normalize_demographics(&raw);
        assert_eq!(demo.ethnicity.as_deref(), Some("Hapa"));
        assert!(!demo.extras.contains_key("q4_ethnicity_other"));
    }

    #[test]
    fn test_non_english_first_language() {
        let raw = payload(json!({
            "q6_english_first": "No",
            "q7_native_language": "Tagalog",
        }));
        let demo = normalize_demographics(&raw);
        assert_eq!(demo.first_language.as_deref(), Some("Tagalog"));
    }

    #[test]
    fn test_malformed_age_becomes_none() {
        let raw = payload(json!({ "q1_age": "twenty" }));
        assert_eq!(normalize_demographics(&raw).age, None);
        let raw = payload(json!({ "q1_age": 41 }));
        assert_eq!(normalize_demographics(&raw).age, Some(41));
    }

    #[test]
    fn test_scalar_citizenship_becomes_single_item_list() {
        let raw = payload(json!({ "citizenship": "UK" }));
        let demo = normalize_demographics(&raw);
        assert_eq!(demo.citizenship, Some(vec!["UK".to_string()]));
    }

    #[test]
    fn test_unrecognized_fields_preserved_in_extras() {
        let raw = payload(json!({
            "q2_gender": "Man",
            "q9_reading_habits": "daily",
            "browser": "firefox",
        }));
        let demo = normalize_demographics(&raw);
        assert_eq!(demo.extras.len(), 2);
        assert_eq!(demo.extras["q9_reading_habits"], json!("daily"));
        assert_eq!(demo.extras["browser"], json!("firefox"));
    }
}
