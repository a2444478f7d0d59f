use crate::model::access::HasOwner;
use crate::model::entity::Test;
use crate::model::grading::Grade;
use crate::model::repo::ResourceTyped;
use crate::model::{DatabaseError, ModelManager, Page, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Constraint name reported when a learner is out of attempts.
pub const ATTEMPTS_EXHAUSTED: &str = "test_results_max_attempts";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct TestResult {
    id: Uuid,
    user_id: Uuid,
    test_id: Uuid,
    score: f64,
    correct_count: i32,
    total_questions: i32,
    is_passed: bool,
    attempt_no: i32,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserAnswer {
    id: Uuid,
    test_result_id: Uuid,
    question_id: Uuid,
    selected_options: Vec<i32>,
    is_correct: bool,
}

impl ResourceTyped for TestResult {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::TestResult
    }
}

impl TestResult {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn test_id(&self) -> Uuid {
        self.test_id
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn is_passed(&self) -> bool {
        self.is_passed
    }

    pub fn attempt_no(&self) -> i32 {
        self.attempt_no
    }
}

impl UserAnswer {
    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn selected_options(&self) -> &[i32] {
        &self.selected_options
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

#[async_trait]
impl HasOwner for TestResult {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}

impl TestResult {
    pub async fn attempt_count(mm: &ModelManager, test_id: Uuid, user_id: Uuid) -> DatabaseResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM test_results WHERE test_id = $1 AND user_id = $2")
                .bind(test_id)
                .bind(user_id)
                .fetch_one(mm.executor())
                .await?;
        Ok(count)
    }

    /// Stores a graded attempt with its answers in one transaction.
    #[tracing::instrument(skip(mm, test, grade), fields(test_id = %test.id()))]
    pub async fn submit(
        mm: &ModelManager,
        user_id: Uuid,
        test: &Test,
        grade: &Grade,
    ) -> DatabaseResult<(Self, Vec<UserAnswer>)> {
        let mut tx = mm.executor().begin().await?;

        let previous: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(attempt_no), 0) FROM test_results WHERE test_id = $1 AND user_id = $2",
        )
        .bind(test.id())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if test.attempts_exhausted(i64::from(previous)) {
            return Err(DatabaseError::Conflict(ATTEMPTS_EXHAUSTED.into()));
        }

        // concurrent submissions collide on (user_id, test_id, attempt_no)
        let result: TestResult = sqlx::query_as(
            r#"
            INSERT INTO test_results
                (id, user_id, test_id, score, correct_count, total_questions, is_passed, attempt_no)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(test.id())
        .bind(grade.score)
        .bind(grade.correct_count)
        .bind(grade.total_questions)
        .bind(grade.is_passed)
        .bind(previous + 1)
        .fetch_one(&mut *tx)
        .await?;

        let mut answers = Vec::with_capacity(grade.answers.len());
        for answer in &grade.answers {
            let row: UserAnswer = sqlx::query_as(
                r#"
                INSERT INTO user_answers (id, test_result_id, question_id, selected_options, is_correct)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(result.id)
            .bind(answer.question_id)
            .bind(&answer.selected_options)
            .bind(answer.is_correct)
            .fetch_one(&mut *tx)
            .await?;
            answers.push(row);
        }

        tx.commit().await?;
        Ok((result, answers))
    }

    pub async fn find(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM test_results WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    pub async fn answers(&self, mm: &ModelManager) -> DatabaseResult<Vec<UserAnswer>> {
        let rows = sqlx::query_as(
            r#"
            SELECT ua.* FROM user_answers ua
            JOIN questions q ON q.id = ua.question_id
            WHERE ua.test_result_id = $1
            ORDER BY q.order_index, q.id
            "#,
        )
        .bind(self.id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn mine(mm: &ModelManager, test_id: Uuid, user_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            "SELECT * FROM test_results WHERE test_id = $1 AND user_id = $2 ORDER BY attempt_no",
        )
        .bind(test_id)
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn page_by_test(
        mm: &ModelManager,
        test_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM test_results WHERE test_id = $1 ORDER BY submitted_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(test_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM test_results WHERE test_id = $1")
            .bind(test_id)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, limit, offset))
    }
}
