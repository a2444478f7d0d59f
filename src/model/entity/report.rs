//! Read-only aggregates for staff dashboards.

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct OverviewReport {
    pub users: i64,
    pub courses: i64,
    pub published_courses: i64,
    pub enrollments: i64,
    pub completed_enrollments: i64,
    pub certificates: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CourseReport {
    pub course_id: Uuid,
    pub enrolled: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub feedback_count: i64,
    pub average_rating: Option<f64>,
    pub test_attempts: i64,
    pub passed_attempts: i64,
}

impl CourseReport {
    /// Share of passed attempts in percent, `None` before the first attempt.
    pub fn pass_rate(&self) -> Option<f64> {
        (self.test_attempts > 0).then(|| {
            (self.passed_attempts as f64 / self.test_attempts as f64 * 10_000.0).round() / 100.0
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LearnerRow {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub department: Option<String>,
    pub enroll_type: String,
    pub status: String,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub best_score: Option<f64>,
}

pub async fn overview(mm: &ModelManager) -> DatabaseResult<OverviewReport> {
    let row = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM courses) AS courses,
            (SELECT COUNT(*) FROM courses WHERE status = 'published') AS published_courses,
            (SELECT COUNT(*) FROM enrollments WHERE status <> 'cancelled') AS enrollments,
            (SELECT COUNT(*) FROM enrollments WHERE status = 'completed') AS completed_enrollments,
            (SELECT COUNT(*) FROM certificates) AS certificates,
            (SELECT AVG(score)::float8 FROM test_results) AS average_score
        "#,
    )
    .fetch_one(mm.executor())
    .await?;
    Ok(row)
}

pub async fn course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<CourseReport> {
    let row = sqlx::query_as(
        r#"
        SELECT
            $1::uuid AS course_id,
            (SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = 'enrolled') AS enrolled,
            (SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = 'in_progress') AS in_progress,
            (SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = 'completed') AS completed,
            (SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = 'cancelled') AS cancelled,
            (SELECT COUNT(*) FROM feedback WHERE course_id = $1) AS feedback_count,
            (SELECT AVG(rating)::float8 FROM feedback WHERE course_id = $1) AS average_rating,
            (SELECT COUNT(*) FROM test_results tr JOIN tests t ON t.id = tr.test_id
                WHERE t.course_id = $1) AS test_attempts,
            (SELECT COUNT(*) FROM test_results tr JOIN tests t ON t.id = tr.test_id
                WHERE t.course_id = $1 AND tr.is_passed) AS passed_attempts
        "#,
    )
    .bind(course_id)
    .fetch_one(mm.executor())
    .await?;
    Ok(row)
}

pub async fn learners(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<LearnerRow>> {
    let rows = sqlx::query_as(
        r#"
        SELECT
            u.id AS user_id,
            u.username,
            u.full_name,
            d.name AS department,
            e.enroll_type,
            e.status,
            (SELECT COUNT(*) FROM lesson_progress lp JOIN lessons l ON l.id = lp.lesson_id
                WHERE l.course_id = $1 AND lp.user_id = u.id AND lp.is_completed) AS completed_lessons,
            (SELECT COUNT(*) FROM lessons WHERE course_id = $1) AS total_lessons,
            (SELECT MAX(tr.score) FROM test_results tr JOIN tests t ON t.id = tr.test_id
                WHERE t.course_id = $1 AND tr.user_id = u.id) AS best_score
        FROM enrollments e
        JOIN users u ON u.id = e.user_id
        LEFT JOIN departments d ON d.id = u.department_id
        WHERE e.course_id = $1
        ORDER BY u.full_name, u.username
        "#,
    )
    .bind(course_id)
    .fetch_all(mm.executor())
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    fn report(attempts: i64, passed: i64) -> CourseReport {
        CourseReport {
            course_id: Uuid::nil(),
            enrolled: 0,
            in_progress: 0,
            completed: 0,
            cancelled: 0,
            feedback_count: 0,
            average_rating: None,
            test_attempts: attempts,
            passed_attempts: passed,
        }
    }

    #[test]
    fn pass_rate_is_a_percentage() {
        assert_eq!(report(0, 0).pass_rate(), None);
        assert_eq!(report(4, 1).pass_rate(), Some(25.0));
        assert_eq!(report(3, 2).pass_rate(), Some(66.67));
    }
}
