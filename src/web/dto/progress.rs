use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::entity::LessonProgress;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProgressResponse {
    lesson_id: Uuid,
    current_time_seconds: i32,
    current_page: i32,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl From<LessonProgress> for ProgressResponse {
    fn from(row: LessonProgress) -> Self {
        Self {
            lesson_id: row.lesson_id(),
            current_time_seconds: row.current_time_seconds(),
            current_page: row.current_page(),
            is_completed: row.is_completed(),
            completed_at: row.completed_at(),
        }
    }
}
