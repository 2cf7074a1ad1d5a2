//! Built-in sample catalog for development and tests
//!
//! Placeholder content only: four passages, each with both question-bank
//! variants at the minimum item count, plus a 60-item vocabulary list.
//! Production deployments load real content from a catalog TOML file instead.

use super::catalog::{Catalog, Choice, Passage, Question, QuestionBank, Variant, VocabItem};

const SAMPLE_PROMPTS: [&str; 5] = [
    "What is the main idea of the passage?",
    "Which detail does the passage state directly?",
    "Which detail supports the author's argument?",
    "What can be inferred from the passage?",
    "What does the highlighted word most nearly mean?",
];

// Mixed real words and pseudowords for the lexical decision task
const SAMPLE_VOCAB: [(&str, bool); 60] = [
    ("elation", true), ("brindle", true), ("quorp", false), ("sindel", false),
    ("nectar", true), ("mervin", false), ("ploxic", false), ("abrupt", true),
    ("fenster", false), ("drindle", false), ("cobalt", true), ("rennet", true),
    ("glaver", false), ("saline", true), ("protem", false), ("dorsal", true),
    ("spline", true), ("nacture", false), ("bromide", true), ("tallow", true),
    ("yarden", false), ("plaint", true), ("cander", false), ("sproot", false),
    ("locust", true), ("tramme", false), ("worsen", true), ("flend", false),
    ("mottle", true), ("parlor", true), ("camber", true), ("thrice", true),
    ("stiple", false), ("ardent", true), ("crenel", true), ("upland", true),
    ("prand", false), ("sconce", true), ("fallacy", true), ("umbrage", true),
    ("wimple", true), ("sartor", false), ("pion", true), ("knurl", true),
    ("morden", false), ("gasket", true), ("sallet", true), ("birl", true),
    ("tinsel", true), ("quintet", true), ("lithe", true), ("dovetail", true),
    ("plorx", false), ("vessel", true), ("corbel", true), ("stanch", true),
    ("eyrie", true), ("flitter", true), ("truckle", true), ("borax", true),
];

fn sample_question(key: &str, variant: Variant, index: usize) -> Question {
    let choices = ["a", "b", "c", "d"]
        .iter()
        .map(|id| Choice {
            id: (*id).to_string(),
            text: format!("Option {}", id.to_ascii_uppercase()),
        })
        .collect();
    // Rotate the correct choice so sample grading is not all-"a"
    let correct = ["a", "b", "c", "d"][index % 4].to_string();
    Question {
        question_id: format!("{}_{}_q{}", key, variant.as_str(), index + 1),
        prompt: SAMPLE_PROMPTS[index % SAMPLE_PROMPTS.len()].to_string(),
        choices,
        correct_choice_id: correct,
    }
}

fn sample_attention_check(key: &str, variant: Variant) -> Question {
    Question {
        question_id: format!("QX_{}_{}", key, variant.as_str()),
        prompt: "To show you are paying attention, select option C.".to_string(),
        choices: ["a", "b", "c", "d"]
            .iter()
            .map(|id| Choice {
                id: (*id).to_string(),
                text: format!("Option {}", id.to_ascii_uppercase()),
            })
            .collect(),
        correct_choice_id: "c".to_string(),
    }
}

fn sample_variant_set(key: &str, variant: Variant) -> Vec<Question> {
    let mut items: Vec<Question> = (0..5).map(|i| sample_question(key, variant, i)).collect();
    items.push(sample_attention_check(key, variant));
    items
}

impl Catalog {
    /// The built-in placeholder catalog
    pub fn sample() -> Catalog {
        let mut catalog = Catalog::default();

        for i in 1..=4u32 {
            let key = format!("p{}", i);
            catalog.passages.insert(
                key.clone(),
                Passage {
                    id: format!("sample_{}_1", i),
                    title: format!("Sample Passage {} (placeholder)", i),
                    text: format!(
                        "This is placeholder passage {}. Replace with real study content.",
                        i
                    ),
                },
            );
            catalog.questions.insert(
                key.clone(),
                QuestionBank {
                    baseline: sample_variant_set(&key, Variant::Baseline),
                    requesta: sample_variant_set(&key, Variant::Requesta),
                },
            );
        }

        catalog.vocab = SAMPLE_VOCAB
            .iter()
            .enumerate()
            .map(|(i, (token, is_word))| VocabItem {
                id: format!("v{:02}", i + 1),
                token: (*token).to_string(),
                is_word: *is_word,
            })
            .collect();

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::catalog::MIN_ITEMS_PER_VARIANT;
    use crate::content::lint_catalog;

    #[test]
    fn test_sample_catalog_passes_lint() {
        let report = lint_catalog(&Catalog::sample());
        assert!(report.errors.is_empty(), "lint errors: {:?}", report.errors);
    }

    #[test]
    fn test_sample_catalog_meets_minimums() {
        let catalog = Catalog::sample();
        assert!(catalog.passages.len() >= 3);
        for (key, bank) in &catalog.questions {
            assert!(
                bank.has_both_variants(MIN_ITEMS_PER_VARIANT),
                "bank {} too small",
                key
            );
            for variant in Variant::ALL {
                let attn: Vec<_> = bank
                    .variant(variant)
                    .iter()
                    .filter(|q| q.is_attention_check())
                    .collect();
                assert_eq!(attn.len(), 1, "{} {} attention checks", key, variant);
            }
        }
        assert_eq!(catalog.vocab.len(), 60);
    }
}
