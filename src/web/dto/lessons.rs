use serde::Serialize;

use crate::{model::entity::Lesson, web::dto::progress::ProgressResponse};

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LessonDetailResponse {
    lesson: Lesson,
    progress: ProgressResponse,
}

impl LessonDetailResponse {
    pub fn new(lesson: Lesson, progress: ProgressResponse) -> Self {
        Self { lesson, progress }
    }
}
