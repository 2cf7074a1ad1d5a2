//! MCQ grading
//!
//! Pure function over the participant's answer map and the question set for
//! the assigned variant. Unknown question ids are skipped silently: stale
//! client state referencing a previous variant or session is an expected
//! operational reality, not a reason to fail the submission. The skip count
//! is reported so callers can log it as a data-quality signal.

use crate::content::Question;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Graded outcome for one submitted question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub user_choice_id: String,
    pub correct_choice_id: String,
    pub is_correct: bool,
}

/// Full grading outcome for one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub per_question: Vec<QuestionResult>,
    /// Always equals the count of per_question entries with is_correct = true
    pub score: u32,
    /// Submitted question ids not present in the question set (skipped)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped_unknown: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Grade a submission against the assigned variant's question set
///
/// Results are ordered by the question set, not by the answer map, so output
/// is deterministic regardless of client-side map ordering.
pub fn grade(answers: &HashMap<String, String>, question_set: &[Question]) -> GradeOutcome {
    let mut outcome = GradeOutcome::default();

    let known: HashMap<&str, &Question> = question_set
        .iter()
        .map(|q| (q.question_id.as_str(), q))
        .collect();

    outcome.skipped_unknown = answers
        .keys()
        .filter(|qid| !known.contains_key(qid.as_str()))
        .count() as u32;

    for q in question_set {
        let Some(choice) = answers.get(&q.question_id) else {
            continue;
        };
        let is_correct = *choice == q.correct_choice_id;
        if is_correct {
            outcome.score += 1;
        }
        outcome.per_question.push(QuestionResult {
            question_id: q.question_id.clone(),
            user_choice_id: choice.clone(),
            correct_choice_id: q.correct_choice_id.clone(),
            is_correct,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Choice;

    fn question(id: &str, correct: &str) -> Question {
        Question {
            question_id: id.to_string(),
            prompt: format!("Prompt for {}", id),
            choices: ["a", "b", "c", "d"]
                .iter()
                .map(|c| Choice {
                    id: (*c).to_string(),
                    text: format!("Option {}", c),
                })
                .collect(),
            correct_choice_id: correct.to_string(),
        }
    }

    fn question_set() -> Vec<Question> {
        vec![
            question("q1", "a"),
            question("q2", "b"),
            question("q3", "c"),
            question("q4", "d"),
            question("q5", "a"),
            question("QX_attn", "c"),
        ]
    }

    #[test]
    fn test_full_correct_submission() {
        let qset = question_set();
        let answers: HashMap<String, String> = qset
            .iter()
            .map(|q| (q.question_id.clone(), q.correct_choice_id.clone()))
            .collect();
        let outcome = grade(&answers, &qset);
        assert_eq!(outcome.score, 6);
        assert_eq!(outcome.per_question.len(), 6);
        assert!(outcome.per_question.iter().all(|r| r.is_correct));
        assert_eq!(outcome.skipped_unknown, 0);
    }

    #[test]
    fn test_score_counts_exact_matches() {
        let qset = question_set();
        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), "a".to_string()); // correct
        answers.insert("q2".to_string(), "d".to_string()); // wrong
        answers.insert("q3".to_string(), "c".to_string()); // correct
        let outcome = grade(&answers, &qset);
        assert_eq!(outcome.score, 2);
        assert_eq!(outcome.per_question.len(), 3);
        assert_eq!(
            outcome.score,
            outcome.per_question.iter().filter(|r| r.is_correct).count() as u32
        );
    }

    #[test]
    fn test_unknown_question_id_is_skipped_silently() {
        let qset = question_set();
        let mut answers = HashMap::new();
        answers.insert("q1".to_string(), "a".to_string());
        answers.insert("stale_q99".to_string(), "b".to_string());
        let outcome = grade(&answers, &qset);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.per_question.len(), 1);
        assert!(outcome
            .per_question
            .iter()
            .all(|r| r.question_id != "stale_q99"));
        assert_eq!(outcome.skipped_unknown, 1);
    }

    #[test]
    fn test_empty_answer_map() {
        let outcome = grade(&HashMap::new(), &question_set());
        assert_eq!(outcome.score, 0);
        assert!(outcome.per_question.is_empty());
        assert_eq!(outcome.skipped_unknown, 0);
    }
}
