use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Page,
    entity::{
        AttachedFile, Course, CourseTargets, Enrollment, FeedbackRow, LessonWithProgressRow,
        MyCourseRow, Test,
    },
};

/// Everything the course page needs in one round trip.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseDetailResponse {
    pub course: Course,
    pub targets: CourseTargets,
    pub lessons: Vec<LessonWithProgressRow>,
    pub tests: Vec<Test>,
    pub files: Vec<AttachedFile>,
    pub enrollment: Option<Enrollment>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct AssignBody {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AssignResponse {
    pub assigned: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MyCourseResponse {
    #[serde(flatten)]
    course: MyCourseRow,
    progress_percent: f64,
}

impl From<MyCourseRow> for MyCourseResponse {
    fn from(row: MyCourseRow) -> Self {
        Self {
            progress_percent: row.progress_percent(),
            course: row,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FeedbackPageResponse {
    #[serde(flatten)]
    page: Page<FeedbackRow>,
    average_rating: Option<f64>,
}

impl FeedbackPageResponse {
    pub fn new(page: Page<FeedbackRow>, average_rating: Option<f64>) -> Self {
        Self {
            page,
            average_rating,
        }
    }
}
