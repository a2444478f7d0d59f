use serde::Serialize;

use crate::model::entity::report::CourseReport;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseReportResponse {
    #[serde(flatten)]
    report: CourseReport,
    pass_rate: Option<f64>,
}

impl From<CourseReport> for CourseReportResponse {
    fn from(report: CourseReport) -> Self {
        Self {
            pass_rate: report.pass_rate(),
            report,
        }
    }
}
