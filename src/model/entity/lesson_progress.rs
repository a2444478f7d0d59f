use crate::model::access::HasOwner;
use crate::model::entity::{Lesson, LessonType};
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LessonProgress {
    id: Uuid,
    user_id: Uuid,
    lesson_id: Uuid,
    current_time_seconds: i32,
    current_page: i32,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for LessonProgress {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::LessonProgress
    }
}

impl LessonProgress {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn current_time_seconds(&self) -> i32 {
        self.current_time_seconds
    }

    pub fn current_page(&self) -> i32 {
        self.current_page
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Row returned when the user never touched the lesson. Not persisted.
    pub fn empty(user_id: Uuid, lesson_id: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            user_id,
            lesson_id,
            current_time_seconds: 0,
            current_page: 0,
            is_completed: false,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }
}

/// Position report sent by the player. Missing fields keep the stored value.
#[derive(Debug, Default, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProgressUpdate {
    #[serde(alias = "currentTimeSeconds", alias = "currentTime")]
    pub current_time_seconds: Option<i32>,
    #[serde(alias = "currentPage")]
    pub current_page: Option<i32>,
    #[serde(default, alias = "isCompleted")]
    pub completed: bool,
}

/// What the completion rule needs to know about a lesson.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTarget {
    pub lesson_type: LessonType,
    pub duration_seconds: i32,
    pub page_count: i32,
}

impl From<&Lesson> for ProgressTarget {
    fn from(lesson: &Lesson) -> Self {
        Self {
            lesson_type: lesson.lesson_type(),
            duration_seconds: lesson.duration_seconds(),
            page_count: lesson.page_count(),
        }
    }
}

fn clamp_position(value: i32, upper: i32) -> i32 {
    let value = value.max(0);
    if upper > 0 { value.min(upper) } else { value }
}

impl ProgressTarget {
    pub fn reached(&self, time_seconds: i32, page: i32, completion_ratio: f64) -> bool {
        match self.lesson_type {
            LessonType::Video if self.duration_seconds > 0 => {
                f64::from(time_seconds) >= completion_ratio * f64::from(self.duration_seconds)
            }
            LessonType::Pdf if self.page_count > 0 => page >= self.page_count,
            _ => false,
        }
    }
}

impl LessonProgress {
    /// Applies a report on top of the stored row. Completion never reverts.
    pub fn apply(
        mut self,
        target: ProgressTarget,
        update: &ProgressUpdate,
        completion_ratio: f64,
        now: DateTime<Utc>,
    ) -> Self {
        if let Some(time) = update.current_time_seconds {
            self.current_time_seconds = clamp_position(time, target.duration_seconds);
        }
        if let Some(page) = update.current_page {
            self.current_page = clamp_position(page, target.page_count);
        }

        let reached = update.completed
            || target.reached(self.current_time_seconds, self.current_page, completion_ratio);
        if reached && !self.is_completed {
            self.is_completed = true;
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        self
    }

    pub async fn find(
        mm: &ModelManager,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2")
                .bind(user_id)
                .bind(lesson_id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(result)
    }

    pub async fn find_or_empty(
        mm: &ModelManager,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> DatabaseResult<Self> {
        Ok(Self::find(mm, user_id, lesson_id)
            .await?
            .unwrap_or_else(|| Self::empty(user_id, lesson_id)))
    }

    #[tracing::instrument(skip(mm, lesson, update))]
    pub async fn save(
        mm: &ModelManager,
        user_id: Uuid,
        lesson: &Lesson,
        update: &ProgressUpdate,
        completion_ratio: f64,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        let stored: Option<Self> = sqlx::query_as(
            "SELECT * FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(lesson.id())
        .fetch_optional(&mut *tx)
        .await?;

        let next = stored
            .unwrap_or_else(|| Self::empty(user_id, lesson.id()))
            .apply(lesson.into(), update, completion_ratio, Utc::now());

        // a concurrent first save may win the insert; completion stays sticky either way
        let row = sqlx::query_as(
            r#"
            INSERT INTO lesson_progress
                (id, user_id, lesson_id, current_time_seconds, current_page, is_completed, completed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, lesson_id) DO UPDATE
            SET current_time_seconds = EXCLUDED.current_time_seconds,
                current_page = EXCLUDED.current_page,
                is_completed = lesson_progress.is_completed OR EXCLUDED.is_completed,
                completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at),
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(lesson.id())
        .bind(next.current_time_seconds)
        .bind(next.current_page)
        .bind(next.is_completed)
        .bind(next.completed_at)
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}

#[async_trait]
impl HasOwner for LessonProgress {
    type OwnerId = uuid::Uuid;

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

    fn video(duration: i32) -> ProgressTarget {
        ProgressTarget {
            lesson_type: LessonType::Video,
            duration_seconds: duration,
            page_count: 0,
        }
    }

    fn pdf(pages: i32) -> ProgressTarget {
        ProgressTarget {
            lesson_type: LessonType::Pdf,
            duration_seconds: 0,
            page_count: pages,
        }
    }

    fn fresh() -> LessonProgress {
        LessonProgress::empty(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn pdf_page_is_kept_as_reported() {
        let update = ProgressUpdate {
            current_page: Some(5),
            ..Default::default()
        };
        let row = fresh().apply(pdf(12), &update, 0.9, Utc::now());
        assert_eq!(row.current_page(), 5);
        assert!(!row.is_completed());
    }

    #[test]
    fn pdf_completes_on_last_page() {
        let update = ProgressUpdate {
            current_page: Some(40),
            ..Default::default()
        };
        let row = fresh().apply(pdf(12), &update, 0.9, Utc::now());
        assert_eq!(row.current_page(), 12);
        assert!(row.is_completed());
        assert!(row.completed_at().is_some());
    }

    #[test]
    fn video_completes_at_ratio() {
        let almost = ProgressUpdate {
            current_time_seconds: Some(89),
            ..Default::default()
        };
        let row = fresh().apply(video(100), &almost, 0.9, Utc::now());
        assert!(!row.is_completed());

        let enough = ProgressUpdate {
            current_time_seconds: Some(90),
            ..Default::default()
        };
        let row = row.apply(video(100), &enough, 0.9, Utc::now());
        assert!(row.is_completed());
    }

    #[test]
    fn completion_is_sticky() {
        let done = ProgressUpdate {
            current_time_seconds: Some(100),
            ..Default::default()
        };
        let row = fresh().apply(video(100), &done, 0.9, Utc::now());
        let completed_at = row.completed_at();

        let rewind = ProgressUpdate {
            current_time_seconds: Some(3),
            ..Default::default()
        };
        let row = row.apply(video(100), &rewind, 0.9, Utc::now());
        assert_eq!(row.current_time_seconds(), 3);
        assert!(row.is_completed());
        assert_eq!(row.completed_at(), completed_at);
    }

    #[test]
    fn text_completes_only_when_flagged() {
        let target = ProgressTarget {
            lesson_type: LessonType::Text,
            duration_seconds: 0,
            page_count: 0,
        };
        let row = fresh().apply(target, &ProgressUpdate::default(), 0.9, Utc::now());
        assert!(!row.is_completed());

        let flagged = ProgressUpdate {
            completed: true,
            ..Default::default()
        };
        let row = row.apply(target, &flagged, 0.9, Utc::now());
        assert!(row.is_completed());
    }

    #[test]
    fn negative_positions_are_clamped() {
        let update = ProgressUpdate {
            current_time_seconds: Some(-10),
            current_page: Some(-1),
            ..Default::default()
        };
        let row = fresh().apply(video(0), &update, 0.9, Utc::now());
        assert_eq!(row.current_time_seconds(), 0);
        assert_eq!(row.current_page(), 0);
    }

    #[test]
    fn camel_case_payload_is_accepted() {
        let update: ProgressUpdate = serde_json::from_str(r#"{"currentPage":5}"#).unwrap();
        assert_eq!(update.current_page, Some(5));
        assert!(!update.completed);
    }

    #[test]
    fn missing_fields_keep_stored_values() {
        let first = ProgressUpdate {
            current_page: Some(4),
            ..Default::default()
        };
        let row = fresh().apply(pdf(10), &first, 0.9, Utc::now());
        let row = row.apply(pdf(10), &ProgressUpdate::default(), 0.9, Utc::now());
        assert_eq!(row.current_page(), 4);
    }
}
