//! Content-catalog linting
//!
//! Structural checks over the catalog run once at startup, before the
//! service accepts traffic. Errors block deployment; warnings are cosmetic
//! recommendations and only get logged.

use super::catalog::{Catalog, Question, Variant, MIN_ITEMS_PER_VARIANT};
use std::collections::HashSet;

const EXPECTED_CHOICE_IDS: [&str; 4] = ["a", "b", "c", "d"];

/// Result of a lint pass
#[derive(Debug, Default, Clone)]
pub struct LintReport {
    /// Problems that should block deployment
    pub errors: Vec<String>,
    /// Safe but recommended fixes
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn err(&mut self, msg: String) {
        self.errors.push(msg);
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

fn lint_choices(q: &Question, where_: &str, report: &mut LintReport) {
    if q.choices.len() < 2 {
        report.err(format!(
            "{}: choices must have at least 2 entries (got {})",
            where_,
            q.choices.len()
        ));
        return;
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for c in &q.choices {
        if c.id.trim().is_empty() || c.text.trim().is_empty() {
            report.err(format!("{}: each choice must have non-empty id/text", where_));
        }
        if !seen.insert(c.id.as_str()) {
            report.err(format!("{}: duplicate choice id '{}'", where_, c.id));
        }
    }
    // With exactly 4 choices, recommend a-d ids
    if q.choices.len() == 4 && !seen.iter().all(|id| EXPECTED_CHOICE_IDS.contains(id)) {
        let mut ids: Vec<&str> = seen.into_iter().collect();
        ids.sort_unstable();
        report.warn(format!(
            "{}: 4 choices but ids are not a/b/c/d ({:?})",
            where_, ids
        ));
    }
}

fn lint_question(q: &Question, where_: &str, report: &mut LintReport) {
    if q.question_id.trim().is_empty() {
        report.err(format!("{}: missing question_id", where_));
    }
    if q.prompt.trim().is_empty() {
        report.err(format!("{}: missing prompt", where_));
    }
    lint_choices(q, where_, report);
    if q.correct_choice_id.trim().is_empty() {
        report.err(format!("{}: missing correct_choice_id", where_));
    } else if !q.choices.iter().any(|c| c.id == q.correct_choice_id) {
        let ids: Vec<&str> = q.choices.iter().map(|c| c.id.as_str()).collect();
        report.err(format!(
            "{}: correct_choice_id '{}' not in choices {:?}",
            where_, q.correct_choice_id, ids
        ));
    }
}

/// Run all structural checks over a catalog
pub fn lint_catalog(catalog: &Catalog) -> LintReport {
    let mut report = LintReport::default();

    // Passages vs. questions cross-check
    for key in catalog.passages.keys() {
        if !catalog.questions.contains_key(key) {
            report.warn(format!("passages has '{}' but questions missing it", key));
        }
    }
    for key in catalog.questions.keys() {
        if !catalog.passages.contains_key(key) {
            report.err(format!("questions has '{}' but passages missing it", key));
        }
    }

    // Passage shape
    for (key, p) in &catalog.passages {
        for (field, value) in [("id", &p.id), ("title", &p.title), ("text", &p.text)] {
            if value.trim().is_empty() {
                report.err(format!(
                    "passages['{}']: '{}' must be a non-empty string",
                    key, field
                ));
            }
        }
    }

    // Question shape and quality
    let mut global_seen_qids: HashSet<String> = HashSet::new();
    for (key, bank) in &catalog.questions {
        for variant in Variant::ALL {
            let qlist = bank.variant(variant);
            if qlist.len() < MIN_ITEMS_PER_VARIANT {
                report.err(format!(
                    "questions['{}']['{}'] has {} items; need >= {} (5 RC + 1 attention)",
                    key,
                    variant,
                    qlist.len(),
                    MIN_ITEMS_PER_VARIANT
                ));
            }

            // exactly one attention check recommended
            let attn = qlist.iter().filter(|q| q.is_attention_check()).count();
            if attn == 0 {
                report.warn(format!(
                    "questions['{}']['{}'] has no attention check (QX*)",
                    key, variant
                ));
            } else if attn > 1 {
                report.warn(format!(
                    "questions['{}']['{}'] has multiple attention checks ({})",
                    key, variant, attn
                ));
            }

            let mut seen_here: HashSet<&str> = HashSet::new();
            for (i, q) in qlist.iter().enumerate() {
                let where_ = format!("questions['{}']['{}'][{}]", key, variant, i + 1);
                lint_question(q, &where_, &mut report);
                let qid = q.question_id.trim();
                if qid.is_empty() {
                    continue;
                }
                if !seen_here.insert(qid) {
                    report.err(format!(
                        "{}: duplicate question_id within set: '{}'",
                        where_, qid
                    ));
                }
                if !global_seen_qids.insert(qid.to_string()) {
                    report.warn(format!(
                        "{}: question_id '{}' is duplicated across sets/passages",
                        where_, qid
                    ));
                }
            }
        }
    }

    // Vocabulary checks
    let mut seen_vids: HashSet<&str> = HashSet::new();
    let mut seen_tokens: HashSet<&str> = HashSet::new();
    for (i, v) in catalog.vocab.iter().enumerate() {
        if v.id.trim().is_empty() {
            report.err(format!("vocab[{}] missing 'id'", i + 1));
        } else if !seen_vids.insert(v.id.as_str()) {
            report.err(format!("vocab duplicate id '{}'", v.id));
        }
        if v.token.trim().is_empty() {
            report.err(format!("vocab[{}] missing 'token'", i + 1));
        } else if !seen_tokens.insert(v.token.as_str()) {
            report.warn(format!("vocab duplicate token '{}'", v.token));
        }
    }

    report
}
