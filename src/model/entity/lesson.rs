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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Video,
    Pdf,
    Text,
}

impl LessonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }
}

impl From<&str> for LessonType {
    fn from(value: &str) -> Self {
        match value {
            "video" => Self::Video,
            "pdf" => Self::Pdf,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Lesson {
    id: Uuid,
    course_id: Uuid,
    title: String,
    lesson_type: String,
    content_url: String,
    content: String,
    duration_seconds: i32,
    page_count: i32,
    order_index: i32,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for Lesson {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Lesson
    }
}

impl Lesson {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn course_id(&self) -> uuid::Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn lesson_type(&self) -> LessonType {
        LessonType::from(self.lesson_type.as_str())
    }

    pub fn content_url(&self) -> &str {
        &self.content_url
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn duration_seconds(&self) -> i32 {
        self.duration_seconds
    }

    pub fn page_count(&self) -> i32 {
        self.page_count
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LessonCreate {
    #[serde(skip)]
    pub course_id: Uuid,
    pub title: String,
    pub lesson_type: LessonType,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub duration_seconds: i32,
    #[serde(default)]
    pub page_count: i32,
    pub order_index: Option<i32>,
}

#[async_trait]
impl CrudRepository<Lesson, LessonCreate, uuid::Uuid> for Lesson {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO lessons
                (id, course_id, title, lesson_type, content_url, content, duration_seconds, page_count, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    COALESCE($9, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM lessons WHERE course_id = $2)))
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.course_id)
        .bind(&data.title)
        .bind(data.lesson_type.as_str())
        .bind(&data.content_url)
        .bind(&data.content)
        .bind(data.duration_seconds)
        .bind(data.page_count)
        .bind(data.order_index)
        .fetch_one(mm.executor())
        .await?;

        Ok(row)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LessonCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            UPDATE lessons
            SET title = $1, lesson_type = $2, content_url = $3, content = $4,
                duration_seconds = $5, page_count = $6, order_index = $7
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(data.lesson_type.as_str())
        .bind(&data.content_url)
        .bind(&data.content)
        .bind(data.duration_seconds)
        .bind(data.page_count)
        .bind(data.order_index.unwrap_or(self.order_index))
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        Ok(row)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM lessons WHERE id = $1")
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
            "SELECT * FROM lessons ORDER BY course_id, order_index LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Lesson, LessonCreate, Uuid);

#[async_trait]
impl HasOwner for Lesson {
    type OwnerId = uuid::Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.course_id)
    }
}

// Utils

/// Lesson joined with the caller's progress, for the course outline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LessonWithProgressRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub lesson_type: String,
    pub duration_seconds: i32,
    pub page_count: i32,
    pub order_index: i32,
    pub current_time_seconds: i32,
    pub current_page: i32,
    pub is_completed: bool,
}

impl Lesson {
    pub async fn all_by_course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM lessons WHERE course_id = $1 ORDER BY order_index, created_at",
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}

impl LessonWithProgressRow {
    pub async fn fetch_by_course(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                l.id,
                l.course_id,
                l.title,
                l.lesson_type,
                l.duration_seconds,
                l.page_count,
                l.order_index,
                COALESCE(lp.current_time_seconds, 0) AS current_time_seconds,
                COALESCE(lp.current_page, 0) AS current_page,
                COALESCE(lp.is_completed, FALSE) AS is_completed
            FROM lessons l
            LEFT JOIN lesson_progress lp
                ON lp.lesson_id = l.id AND lp.user_id = $2
            WHERE l.course_id = $1
            ORDER BY l.order_index, l.created_at
            "#,
        )
        .bind(course_id)
        .bind(actor.user_id())
        .fetch_all(mm.executor())
        .await?;

        Ok(rows)
    }
}
