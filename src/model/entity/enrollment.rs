use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::entity::EnrollType;
use crate::model::repo::ResourceTyped;
use crate::model::{DatabaseResult, ModelManager, Page};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl From<&str> for EnrollmentStatus {
    fn from(value: &str) -> Self {
        match value {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Enrolled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    enroll_type: String,
    status: String,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl ResourceTyped for Enrollment {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Enrollment
    }
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn enroll_type(&self) -> EnrollType {
        EnrollType::from(self.enroll_type.as_str())
    }

    pub fn status(&self) -> EnrollmentStatus {
        EnrollmentStatus::from(self.status.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }
}

#[async_trait::async_trait]
impl HasOwner for Enrollment {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}

/// Row of the learner's "my courses" list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct MyCourseRow {
    pub enrollment_id: Uuid,
    pub course_id: Uuid,
    pub code: String,
    pub title: String,
    pub thumbnail_url: String,
    pub enroll_type: String,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_lessons: i64,
    pub completed_lessons: i64,
}

impl MyCourseRow {
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.completed_lessons, self.total_lessons)
    }
}

pub fn progress_percent(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (completed.min(total) as f64 / total as f64 * 100.0).round()
}

impl Enrollment {
    pub async fn find(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM enrollments WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    /// Active (non-cancelled) enrollment of `user_id` in `course_id`.
    pub async fn find_active(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        Ok(Self::find(mm, course_id, user_id)
            .await?
            .filter(Enrollment::is_active))
    }

    /// Self-service enrollment. A cancelled row is re-activated as optional.
    pub async fn enroll_optional(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO enrollments (id, course_id, user_id, enroll_type, status)
            VALUES ($1, $2, $3, 'optional', 'enrolled')
            ON CONFLICT (course_id, user_id) DO UPDATE
            SET enroll_type = 'optional', status = 'enrolled', enrolled_at = now(),
                completed_at = NULL, cancelled_at = NULL
            WHERE enrollments.status = 'cancelled'
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(mm.executor())
        .await?;

        // the conditional upsert yields no row when an active enrollment exists
        row.ok_or_else(|| crate::model::DatabaseError::Conflict("enrollments_course_id_user_id_key".into()))
    }

    pub async fn cancel(self, mm: &ModelManager) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            UPDATE enrollments SET status = 'cancelled', cancelled_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    /// Mandatory assignment of `user_ids`. Existing rows become mandatory and
    /// cancelled rows are re-activated; completed rows keep their status.
    pub async fn assign(
        mm: &ModelManager,
        course_id: Uuid,
        user_ids: &[Uuid],
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            INSERT INTO enrollments (id, course_id, user_id, enroll_type, status)
            SELECT gen_random_uuid(), $1, u.id, 'mandatory', 'enrolled'
            FROM users u
            WHERE u.id = ANY($2::uuid[])
            ON CONFLICT (course_id, user_id) DO UPDATE
            SET enroll_type = 'mandatory',
                status = CASE WHEN enrollments.status = 'cancelled' THEN 'enrolled' ELSE enrollments.status END,
                cancelled_at = NULL
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(user_ids)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    /// Active users in the course's target departments or employee levels.
    pub async fn target_user_ids(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT u.id FROM users u
            WHERE u.is_active
              AND (
                u.department_id IN (SELECT department_id FROM course_departments WHERE course_id = $1)
                OR u.employee_level_id IN (SELECT employee_level_id FROM course_employee_levels WHERE course_id = $1)
              )
            "#,
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(ids)
    }

    /// Recomputes the status from lesson progress and test results.
    /// Cancelled and completed enrollments are left untouched.
    pub async fn refresh_status(
        mm: &ModelManager,
        course_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let Some(enrollment) = Self::find_active(mm, course_id, user_id).await? else {
            return Ok(None);
        };
        if enrollment.status() == EnrollmentStatus::Completed {
            return Ok(Some(enrollment));
        }

        let completion = CourseCompletion::fetch(mm, course_id, user_id).await?;
        let next = if completion.is_complete() {
            EnrollmentStatus::Completed
        } else if completion.has_activity() {
            EnrollmentStatus::InProgress
        } else {
            EnrollmentStatus::Enrolled
        };

        if next == enrollment.status() {
            return Ok(Some(enrollment));
        }

        let row = sqlx::query_as(
            r#"
            UPDATE enrollments
            SET status = $1::text, completed_at = CASE WHEN $1::text = 'completed' THEN now() ELSE NULL END
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(next.as_str())
        .bind(enrollment.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(Some(row))
    }

    pub async fn my_courses(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<Vec<MyCourseRow>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                e.id AS enrollment_id,
                c.id AS course_id,
                c.code,
                c.title,
                c.thumbnail_url,
                e.enroll_type,
                e.status,
                e.enrolled_at,
                e.completed_at,
                (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS total_lessons,
                (SELECT COUNT(*) FROM lessons l
                    JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.user_id = e.user_id
                    WHERE l.course_id = c.id AND lp.is_completed) AS completed_lessons
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1 AND e.status <> 'cancelled'
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn page_by_course(
        mm: &ModelManager,
        course_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at LIMIT $2 OFFSET $3",
        )
        .bind(course_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, limit, offset))
    }
}

/// Per-learner completion figures of one course.
#[derive(Debug, Clone, FromRow)]
pub struct CourseCompletion {
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub started_lessons: i64,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub attempted_tests: i64,
}

impl CourseCompletion {
    pub async fn fetch(mm: &ModelManager, course_id: Uuid, user_id: Uuid) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM lessons WHERE course_id = $1) AS total_lessons,
                (SELECT COUNT(*) FROM lesson_progress lp JOIN lessons l ON l.id = lp.lesson_id
                    WHERE l.course_id = $1 AND lp.user_id = $2 AND lp.is_completed) AS completed_lessons,
                (SELECT COUNT(*) FROM lesson_progress lp JOIN lessons l ON l.id = lp.lesson_id
                    WHERE l.course_id = $1 AND lp.user_id = $2) AS started_lessons,
                (SELECT COUNT(*) FROM tests WHERE course_id = $1) AS total_tests,
                (SELECT COUNT(DISTINCT tr.test_id) FROM test_results tr JOIN tests t ON t.id = tr.test_id
                    WHERE t.course_id = $1 AND tr.user_id = $2 AND tr.is_passed) AS passed_tests,
                (SELECT COUNT(DISTINCT tr.test_id) FROM test_results tr JOIN tests t ON t.id = tr.test_id
                    WHERE t.course_id = $1 AND tr.user_id = $2) AS attempted_tests
            "#,
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    /// Every lesson completed and every test passed, and there was something to do.
    pub fn is_complete(&self) -> bool {
        let has_content = self.total_lessons + self.total_tests > 0;
        has_content
            && self.completed_lessons >= self.total_lessons
            && self.passed_tests >= self.total_tests
    }

    pub fn has_activity(&self) -> bool {
        self.started_lessons > 0 || self.attempted_tests > 0
    }
}
