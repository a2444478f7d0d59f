use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{
    model::{
        ResourceType,
        entity::{
            Course, CourseCreate,
            report::{self, LearnerRow, OverviewReport},
        },
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::reports::CourseReportResponse,
        error::ErrorResponse,
        routes::fetch_or_404,
    },
};

const RESOURCE: ResourceType = ResourceType::Report;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/overview", get(report_overview_handler))
        .route("/reports/courses/{id}", get(report_course_handler))
        .route("/reports/courses/{id}/learners", get(report_learners_handler))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/overview",
    responses(
        (status = 200, description = "Organisation-wide figures", body = OverviewReport),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    tag = "reports",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn report_overview_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.staff(RESOURCE)?;
    let overview = report::overview(state.pool())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(overview)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrollment, feedback and test figures", body = CourseReportResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "reports",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn report_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let course = report::course(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(CourseReportResponse::from(course))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/courses/{id}/learners",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "One row per enrolled learner", body = Vec<LearnerRow>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "reports",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn report_learners_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let learners = report::learners(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(learners)))
}
