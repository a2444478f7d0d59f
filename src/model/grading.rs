//! Scoring of a test submission. Pure; persistence lives in `TestResult::submit`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::entity::Question;

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_options: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub selected_options: Vec<i32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    /// Percentage of earned points, rounded to two decimals.
    pub score: f64,
    pub correct_count: i32,
    pub total_questions: i32,
    pub is_passed: bool,
    pub answers: Vec<GradedAnswer>,
}

fn normalized(options: &[i32]) -> Vec<i32> {
    let mut options = options.to_vec();
    options.sort_unstable();
    options.dedup();
    options
}

/// Grades `answers` against every question of the test. Unanswered questions
/// count as wrong, answers to unknown questions are ignored.
pub fn grade(questions: &[Question], answers: &[SubmittedAnswer], pass_score: f64) -> Grade {
    let submitted: HashMap<Uuid, &SubmittedAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut earned = 0i64;
    let mut total = 0i64;
    let mut correct_count = 0;
    let mut graded = Vec::with_capacity(questions.len());

    for question in questions {
        let selected = submitted
            .get(&question.id())
            .map(|a| normalized(&a.selected_options))
            .unwrap_or_default();
        let is_correct = !selected.is_empty() && selected == normalized(question.correct_options());

        total += i64::from(question.points());
        if is_correct {
            earned += i64::from(question.points());
            correct_count += 1;
        }

        graded.push(GradedAnswer {
            question_id: question.id(),
            selected_options: selected,
            is_correct,
        });
    }

    let score = if total == 0 {
        0.0
    } else {
        (earned as f64 / total as f64 * 10_000.0).round() / 100.0
    };

    Grade {
        score,
        correct_count,
        total_questions: questions.len() as i32,
        is_passed: score >= pass_score,
        answers: graded,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn question(correct: Vec<i32>, points: i32) -> Question {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "test_id": Uuid::nil(),
            "content": "q",
            "question_type": if correct.len() > 1 { "multiple" } else { "single" },
            "options": ["a", "b", "c", "d"],
            "correct_options": correct,
            "points": points,
            "order_index": 0,
        }))
        .unwrap()
    }

    fn answer(q: &Question, selected: Vec<i32>) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: q.id(),
            selected_options: selected,
        }
    }

    #[test]
    fn all_correct_scores_full_marks() {
        let qs = vec![question(vec![0], 1), question(vec![1, 3], 2)];
        let answers = vec![answer(&qs[0], vec![0]), answer(&qs[1], vec![3, 1])];
        let grade = grade(&qs, &answers, 80.0);
        assert_eq!(grade.score, 100.0);
        assert_eq!(grade.correct_count, 2);
        assert!(grade.is_passed);
    }

    #[test]
    fn score_is_weighted_by_points() {
        let qs = vec![question(vec![0], 1), question(vec![2], 3)];
        let answers = vec![answer(&qs[0], vec![0]), answer(&qs[1], vec![1])];
        let grade = grade(&qs, &answers, 50.0);
        assert_eq!(grade.score, 25.0);
        assert_eq!(grade.correct_count, 1);
        assert!(!grade.is_passed);
    }

    #[test]
    fn partial_multiple_choice_is_wrong() {
        let qs = vec![question(vec![0, 1], 1)];
        let grade = grade(&qs, &[answer(&qs[0], vec![0])], 50.0);
        assert_eq!(grade.score, 0.0);
        assert!(!grade.answers[0].is_correct);
    }

    #[test]
    fn unanswered_and_unknown_answers() {
        let qs = vec![question(vec![0], 1), question(vec![1], 1)];
        let stray = SubmittedAnswer {
            question_id: Uuid::new_v4(),
            selected_options: vec![0],
        };
        let grade = grade(&qs, &[answer(&qs[0], vec![0]), stray], 50.0);
        assert_eq!(grade.answers.len(), 2);
        assert_eq!(grade.score, 50.0);
        assert!(grade.is_passed);
        assert!(grade.answers[1].selected_options.is_empty());
    }

    #[test]
    fn empty_test_scores_zero() {
        let grade = grade(&[], &[], 0.0);
        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.total_questions, 0);
        assert!(grade.is_passed);
    }

    #[test]
    fn passing_matches_threshold() {
        let qs = vec![question(vec![0], 1), question(vec![1], 1), question(vec![2], 1)];
        let answers = vec![answer(&qs[0], vec![0]), answer(&qs[1], vec![1])];
        let grade = grade(&qs, &answers, 66.67);
        assert_eq!(grade.score, 66.67);
        assert_eq!(grade.is_passed, grade.score >= 66.67);
    }
}
