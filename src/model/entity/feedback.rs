use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, Page, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Feedback {
    id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FeedbackCreate {
    /// Wider than the column so out-of-range values reach `validate`
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

impl FeedbackCreate {
    pub fn validate(&self) -> Result<(), String> {
        if !RATING_RANGE.contains(&self.rating) {
            return Err(format!(
                "rating must be between {} and {}",
                RATING_RANGE.start(),
                RATING_RANGE.end()
            ));
        }
        Ok(())
    }
}

/// Feedback row with the author's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl ResourceTyped for Feedback {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Feedback
    }
}

impl Feedback {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn rating(&self) -> i16 {
        self.rating
    }

    /// One submission per user and course; a second one is a `Conflict`.
    pub async fn submit(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
        data: &FeedbackCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO feedback (id, course_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4::smallint, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .bind(data.rating)
        .bind(data.comment.trim())
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    pub async fn find_mine(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM feedback WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    pub async fn page_by_course(
        mm: &ModelManager,
        course_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<FeedbackRow>> {
        let items = sqlx::query_as(
            r#"
            SELECT f.id, f.course_id, f.user_id, u.full_name, f.rating, f.comment, f.created_at
            FROM feedback f
            JOIN users u ON u.id = f.user_id
            WHERE f.course_id = $1
            ORDER BY f.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(course_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, limit, offset))
    }

    /// Mean rating of a course, `None` without feedback.
    pub async fn average_rating(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Option<f64>> {
        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating)::float8 FROM feedback WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(mm.executor())
                .await?;
        Ok(avg)
    }
}

#[async_trait]
impl HasOwner for Feedback {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rating_bounds() {
        for rating in [1, 3, 5] {
            let data = FeedbackCreate {
                rating,
                comment: String::new(),
            };
            assert!(data.validate().is_ok());
        }
        for rating in [0, 6, -1, 40_000, i64::MAX] {
            let data = FeedbackCreate {
                rating,
                comment: String::new(),
            };
            assert!(data.validate().is_err());
        }
    }
}
