use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
        }
    }
}

impl From<&str> for QuestionType {
    fn from(value: &str) -> Self {
        match value {
            "multiple" => Self::Multiple,
            _ => Self::Single,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Question {
    id: Uuid,
    test_id: Uuid,
    content: String,
    question_type: String,
    options: Vec<String>,
    correct_options: Vec<i32>,
    points: i32,
    order_index: i32,
}

impl ResourceTyped for Question {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Question
    }
}

impl Question {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn test_id(&self) -> Uuid {
        self.test_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn question_type(&self) -> QuestionType {
        QuestionType::from(self.question_type.as_str())
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_options(&self) -> &[i32] {
        &self.correct_options
    }

    pub fn points(&self) -> i32 {
        self.points
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QuestionCreate {
    #[serde(skip)]
    pub test_id: Uuid,
    pub content: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_options: Vec<i32>,
    #[serde(default = "default_points")]
    pub points: i32,
    pub order_index: Option<i32>,
}

fn default_points() -> i32 {
    1
}

impl QuestionCreate {
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("question content must not be empty".into());
        }
        if self.options.len() < 2 {
            return Err("a question needs at least two options".into());
        }
        if self.points <= 0 {
            return Err("points must be positive".into());
        }
        if self.correct_options.is_empty() {
            return Err("at least one correct option is required".into());
        }

        let len = self.options.len() as i32;
        if self.correct_options.iter().any(|&i| i < 0 || i >= len) {
            return Err("correct option index out of range".into());
        }

        let mut distinct = self.correct_options.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() != self.correct_options.len() {
            return Err("correct options must not repeat".into());
        }
        if self.question_type == QuestionType::Single && distinct.len() != 1 {
            return Err("a single-choice question has exactly one correct option".into());
        }
        Ok(())
    }
}

#[async_trait]
impl CrudRepository<Question, QuestionCreate, Uuid> for Question {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuestionCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO questions (id, test_id, content, question_type, options, correct_options, points, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    COALESCE($8, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions WHERE test_id = $2)))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.test_id)
        .bind(&data.content)
        .bind(data.question_type.as_str())
        .bind(&data.options)
        .bind(&data.correct_options)
        .bind(data.points)
        .bind(data.order_index)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuestionCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            UPDATE questions
            SET content = $1, question_type = $2, options = $3, correct_options = $4,
                points = $5, order_index = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&data.content)
        .bind(data.question_type.as_str())
        .bind(&data.options)
        .bind(&data.correct_options)
        .bind(data.points)
        .bind(data.order_index.unwrap_or(self.order_index))
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM questions ORDER BY test_id, order_index LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

impl_paginatable_for!(Question, QuestionCreate, Uuid);

impl Question {
    pub async fn all_by_test(mm: &ModelManager, test_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM questions WHERE test_id = $1 ORDER BY order_index, id")
                .bind(test_id)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn question(kind: QuestionType, correct: Vec<i32>) -> QuestionCreate {
        QuestionCreate {
            test_id: Uuid::new_v4(),
            content: "Which extinguisher is used on electrical fires?".into(),
            question_type: kind,
            options: vec!["Water".into(), "CO2".into(), "Foam".into()],
            correct_options: correct,
            points: 1,
            order_index: None,
        }
    }

    #[test]
    fn valid_questions_pass() {
        assert!(question(QuestionType::Single, vec![1]).validate().is_ok());
        assert!(question(QuestionType::Multiple, vec![1, 2]).validate().is_ok());
    }

    #[test]
    fn single_choice_needs_exactly_one_answer() {
        assert!(question(QuestionType::Single, vec![0, 1]).validate().is_err());
        assert!(question(QuestionType::Single, vec![]).validate().is_err());
    }

    #[test]
    fn indices_must_point_at_options() {
        assert!(question(QuestionType::Multiple, vec![3]).validate().is_err());
        assert!(question(QuestionType::Multiple, vec![-1]).validate().is_err());
        assert!(question(QuestionType::Multiple, vec![1, 1]).validate().is_err());
    }

    #[test]
    fn needs_two_options() {
        let mut data = question(QuestionType::Single, vec![0]);
        data.options.truncate(1);
        assert!(data.validate().is_err());
    }
}
