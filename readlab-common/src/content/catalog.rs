//! Catalog data types and loading

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Minimum items per question-bank variant (5 substantive + 1 attention check)
pub const MIN_ITEMS_PER_VARIANT: usize = 6;

/// Question ids carrying this prefix (case-insensitive) are attention checks.
/// They stay in raw grading but are excluded from participant-facing review.
pub const ATTENTION_CHECK_PREFIX: &str = "QX";

/// One of the two question-source variants (the experimental condition)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Baseline,
    Requesta,
}

impl Variant {
    /// Both allowed variants, in canonical order
    pub const ALL: [Variant; 2] = [Variant::Baseline, Variant::Requesta];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Requesta => "requesta",
        }
    }

    /// The other variant of the pair
    pub fn other(&self) -> Variant {
        match self {
            Variant::Baseline => Variant::Requesta,
            Variant::Requesta => Variant::Baseline,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single answer choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
}

/// One multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub prompt: String,
    pub choices: Vec<Choice>,
    pub correct_choice_id: String,
}

impl Question {
    /// Attention checks are flagged by a reserved id prefix
    pub fn is_attention_check(&self) -> bool {
        self.question_id
            .to_ascii_uppercase()
            .starts_with(ATTENTION_CHECK_PREFIX)
    }
}

/// Question bank for one passage, split into the two variants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub baseline: Vec<Question>,
    #[serde(default)]
    pub requesta: Vec<Question>,
}

impl QuestionBank {
    pub fn variant(&self, variant: Variant) -> &[Question] {
        match variant {
            Variant::Baseline => &self.baseline,
            Variant::Requesta => &self.requesta,
        }
    }

    /// True when both variants carry at least `min` items
    pub fn has_both_variants(&self, min: usize) -> bool {
        self.baseline.len() >= min && self.requesta.len() >= min
    }

    /// True when at least one variant carries any items at all
    pub fn has_any_items(&self) -> bool {
        !self.baseline.is_empty() || !self.requesta.is_empty()
    }
}

/// A reading passage
///
/// The catalog key (e.g. "p7") is distinct from the stable content id
/// (e.g. "history_3_1"); analysis joins on the content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable content identifier, unique across catalog revisions
    pub id: String,
    pub title: String,
    pub text: String,
}

/// One vocabulary recognition item (real word or pseudoword)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabItem {
    pub id: String,
    pub token: String,
    pub is_word: bool,
}

/// The full content catalog
///
/// BTreeMaps keep key iteration order stable, which the deterministic
/// randomization relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub passages: BTreeMap<String, Passage>,
    pub questions: BTreeMap<String, QuestionBank>,
    #[serde(default)]
    pub vocab: Vec<VocabItem>,
}

impl Catalog {
    /// Parse a catalog from TOML text
    pub fn from_toml_str(text: &str) -> Result<Catalog> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid catalog file: {}", e)))
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Catalog> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn passage(&self, key: &str) -> Result<&Passage> {
        self.passages
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("Passage not found: {}", key)))
    }

    pub fn bank(&self, key: &str) -> Result<&QuestionBank> {
        self.questions
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("No questions for passage: {}", key)))
    }

    /// Question set for the assigned variant of a passage
    pub fn question_set(&self, key: &str, variant: Variant) -> Result<&[Question]> {
        Ok(self.bank(key)?.variant(variant))
    }

    pub fn vocab_item(&self, item_id: &str) -> Result<&VocabItem> {
        self.vocab
            .iter()
            .find(|v| v.id == item_id)
            .ok_or_else(|| Error::NotFound(format!("Unknown vocabulary item: {}", item_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_pairing() {
        for v in Variant::ALL {
            assert_ne!(v.other(), v);
            assert_eq!(v.other().other(), v);
        }
        assert_eq!(Variant::Baseline.as_str(), "baseline");
        assert_eq!(Variant::Requesta.as_str(), "requesta");
        assert_eq!(Variant::Baseline.to_string(), "baseline");
    }

    #[test]
    fn test_attention_check_prefix_case_insensitive() {
        let q = Question {
            question_id: "qx_p1_baseline".to_string(),
            prompt: "attention".to_string(),
            choices: vec![],
            correct_choice_id: "a".to_string(),
        };
        assert!(q.is_attention_check());

        let q2 = Question {
            question_id: "p1q1".to_string(),
            ..q
        };
        assert!(!q2.is_attention_check());
    }

    #[test]
    fn test_catalog_toml_parsing() {
        let toml = r#"
            [passages.p1]
            id = "sample_1"
            title = "Sample"
            text = "Body text."

            [questions.p1]
            baseline = [
                { question_id = "q1", prompt = "Main idea?", correct_choice_id = "a", choices = [
                    { id = "a", text = "A" },
                    { id = "b", text = "B" },
                ] },
            ]

            [[vocab]]
            id = "v01"
            token = "elation"
            is_word = true
        "#;
        let catalog = Catalog::from_toml_str(toml).unwrap();
        assert_eq!(catalog.passage("p1").unwrap().id, "sample_1");
        assert_eq!(
            catalog.question_set("p1", Variant::Baseline).unwrap().len(),
            1
        );
        assert!(catalog.question_set("p1", Variant::Requesta).unwrap().is_empty());
        assert!(catalog.vocab_item("v01").unwrap().is_word);
        assert!(catalog.vocab_item("v99").is_err());
        assert!(catalog.passage("p9").is_err());
    }
}
