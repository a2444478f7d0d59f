use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// A graded test attached to a course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Test {
    id: Uuid,
    course_id: Uuid,
    title: String,
    description: String,
    pass_score: f64,
    time_limit_minutes: Option<i32>,
    max_attempts: Option<i32>,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for Test {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Test
    }
}

impl Test {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pass_score(&self) -> f64 {
        self.pass_score
    }

    pub fn time_limit_minutes(&self) -> Option<i32> {
        self.time_limit_minutes
    }

    pub fn max_attempts(&self) -> Option<i32> {
        self.max_attempts
    }

    pub fn attempts_exhausted(&self, attempts_made: i64) -> bool {
        self.max_attempts
            .is_some_and(|max| attempts_made >= i64::from(max))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TestCreate {
    #[serde(skip)]
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Falls back to `learning.default_pass_score`.
    pub pass_score: Option<f64>,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
}

impl TestCreate {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".into());
        }
        if let Some(score) = self.pass_score {
            if !(0.0..=100.0).contains(&score) {
                return Err("pass_score must be between 0 and 100".into());
            }
        }
        if self.time_limit_minutes.is_some_and(|v| v <= 0) {
            return Err("time_limit_minutes must be positive".into());
        }
        if self.max_attempts.is_some_and(|v| v <= 0) {
            return Err("max_attempts must be positive".into());
        }
        Ok(())
    }
}

#[async_trait]
impl CrudRepository<Test, TestCreate, Uuid> for Test {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: TestCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO tests (id, course_id, title, description, pass_score, time_limit_minutes, max_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.course_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.pass_score.unwrap_or(crate::config::DEFAULT_PASS_SCORE))
        .bind(data.time_limit_minutes)
        .bind(data.max_attempts)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: TestCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            UPDATE tests
            SET title = $1, description = $2, pass_score = $3, time_limit_minutes = $4, max_attempts = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.pass_score.unwrap_or(self.pass_score))
        .bind(data.time_limit_minutes)
        .bind(data.max_attempts)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM tests WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM tests WHERE id = $1")
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
        let result =
            sqlx::query_as("SELECT * FROM tests ORDER BY created_at LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tests")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

impl_paginatable_for!(Test, TestCreate, Uuid);

#[async_trait]
impl HasOwner for Test {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.course_id)
    }
}

impl Test {
    pub async fn all_by_course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM tests WHERE course_id = $1 ORDER BY created_at")
                .bind(course_id)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload() -> TestCreate {
        TestCreate {
            course_id: Uuid::new_v4(),
            title: "Safety basics".into(),
            description: String::new(),
            pass_score: Some(70.0),
            time_limit_minutes: None,
            max_attempts: Some(2),
        }
    }

    #[test]
    fn pass_score_must_be_a_percentage() {
        assert!(payload().validate().is_ok());

        let mut data = payload();
        data.pass_score = Some(120.0);
        assert!(data.validate().is_err());

        data.pass_score = None;
        assert!(data.validate().is_ok());
    }

    #[test]
    fn limits_must_be_positive() {
        let mut data = payload();
        data.max_attempts = Some(0);
        assert!(data.validate().is_err());

        let mut data = payload();
        data.time_limit_minutes = Some(-5);
        assert!(data.validate().is_err());
    }
}
