use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    entity::{Question, QuestionType, Test, TestResult, UserAnswer},
    grading::SubmittedAnswer,
};

/// Question as shown to the caller. Correct options are only revealed to staff.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QuestionResponse {
    id: Uuid,
    content: String,
    question_type: QuestionType,
    options: Vec<String>,
    points: i32,
    order_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    correct_options: Option<Vec<i32>>,
}

impl QuestionResponse {
    pub fn new(question: Question, reveal: bool) -> Self {
        Self {
            id: question.id(),
            content: question.content().to_string(),
            question_type: question.question_type(),
            options: question.options().to_vec(),
            points: question.points(),
            order_index: question.order_index(),
            correct_options: reveal.then(|| question.correct_options().to_vec()),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TestDetailResponse {
    test: Test,
    questions: Vec<QuestionResponse>,
    attempts_made: i64,
}

impl TestDetailResponse {
    pub fn new(test: Test, questions: Vec<QuestionResponse>, attempts_made: i64) -> Self {
        Self {
            test,
            questions,
            attempts_made,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SubmitBody {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ResultResponse {
    result: TestResult,
    answers: Vec<UserAnswer>,
}

impl ResultResponse {
    pub fn new(result: TestResult, answers: Vec<UserAnswer>) -> Self {
        Self { result, answers }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn question() -> Question {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "test_id": Uuid::new_v4(),
            "content": "2 + 2?",
            "question_type": "single",
            "options": ["3", "4"],
            "correct_options": [1],
            "points": 1,
            "order_index": 0,
        }))
        .unwrap()
    }

    #[test]
    fn students_do_not_see_answers() {
        let json = serde_json::to_value(QuestionResponse::new(question(), false)).unwrap();
        assert!(json.get("correct_options").is_none());

        let json = serde_json::to_value(QuestionResponse::new(question(), true)).unwrap();
        assert_eq!(json["correct_options"], serde_json::json!([1]));
    }
}
