use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        DatabaseError, Page, ResourceType,
        entity::{AuditAction, Course, CourseCreate, EnrollType, Enrollment, EnrollmentStatus},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::courses::{AssignBody, AssignResponse, MyCourseResponse},
        error::ErrorResponse,
        routes::{PaginationQuery, audit, fetch_or_404, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Enrollment;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/{id}/enroll",
            post(enroll_handler).delete(cancel_enrollment_handler),
        )
        .route("/courses/{id}/assign", post(assign_handler))
        .route("/courses/{id}/assign-targets", post(assign_targets_handler))
        .route("/courses/{id}/enrollments", get(course_enrollments_handler))
        .route("/enrollments/me", get(my_enrollments_handler))
}

fn enrollment_changed(state: &AppState, enrollment: &Enrollment) {
    state.events().publish(LmsEvent::EnrollmentChanged {
        course_id: enrollment.course_id(),
        user_id: enrollment.user_id(),
        status: enrollment.status().as_str().to_string(),
    });
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/enroll",
    description = "Self-service enrollment into a published course",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Registration closed", body = ErrorResponse),
        (status = 403, description = "Mandatory course", body = ErrorResponse),
        (status = 404, description = "Course not found or not published", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn enroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = visible_course(&state, user, id).await?;
    if !course.is_published() {
        return Err(WebError::resource_bad_request(RESOURCE, "course is not open for enrollment"));
    }
    if course.enroll_type() == EnrollType::Mandatory {
        return Err(WebError::resource_not_allowed(
            RESOURCE,
            "mandatory courses are assigned by staff",
        ));
    }
    if course.registration_closed(Utc::now()) {
        return Err(WebError::resource_bad_request(RESOURCE, "registration deadline has passed"));
    }

    let enrollment = Enrollment::enroll_optional(state.pool(), id, user.user_id())
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => {
                WebError::resource_conflict(RESOURCE, "already enrolled in this course")
            }
            e => WebError::database(RESOURCE, e),
        })?;

    tracing::info!("user {} enrolled into course {}", user.user_id(), course.code());
    enrollment_changed(&state, &enrollment);
    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}/enroll",
    description = "Cancels the caller's optional enrollment",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrollment cancelled", body = Enrollment),
        (status = 400, description = "Completed or registration closed", body = ErrorResponse),
        (status = 403, description = "Mandatory enrollment", body = ErrorResponse),
        (status = 404, description = "Not enrolled", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn cancel_enrollment_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let enrollment = Enrollment::find_active(state.pool(), id, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
        .ok_or_else(|| WebError::resource_not_found(RESOURCE))?;

    if enrollment.enroll_type() == EnrollType::Mandatory {
        return Err(WebError::resource_not_allowed(
            RESOURCE,
            "mandatory enrollments cannot be cancelled",
        ));
    }
    if enrollment.status() == EnrollmentStatus::Completed {
        return Err(WebError::resource_bad_request(RESOURCE, "course already completed"));
    }
    if course.registration_closed(Utc::now()) {
        return Err(WebError::resource_bad_request(RESOURCE, "registration deadline has passed"));
    }

    let cancelled = enrollment
        .cancel(state.pool())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    enrollment_changed(&state, &cancelled);
    Ok((StatusCode::OK, Json(cancelled)))
}

async fn assign_users(
    state: &AppState,
    ctx: &RequestContext,
    course_id: Uuid,
    user_ids: Vec<Uuid>,
    source: &str,
) -> WebResult<AssignResponse> {
    let user = ctx.staff(RESOURCE)?;
    fetch_or_404::<Course, CourseCreate>(state, user, course_id).await?;

    let rows = Enrollment::assign(state.pool(), course_id, &user_ids)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        state,
        user,
        AuditAction::Assign,
        ResourceType::Course,
        Some(course_id),
        json!({ "source": source, "requested": user_ids.len(), "assigned": rows.len() }),
    )
    .await;
    for row in &rows {
        enrollment_changed(state, row);
    }

    Ok(AssignResponse {
        assigned: rows.len(),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/assign",
    description = "Mandatory enrollment of the given users. Unknown ids are skipped",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = AssignBody,
    responses(
        (status = 200, description = "Enrollments touched", body = AssignResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn assign_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignBody>,
) -> WebResult<impl IntoResponse> {
    let assigned = assign_users(&state, &ctx, id, payload.user_ids, "users").await?;
    Ok((StatusCode::OK, Json(assigned)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/assign-targets",
    description = "Mandatory enrollment of every active user in the course's departments or employee levels",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrollments touched", body = AssignResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn assign_targets_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    ctx.staff(RESOURCE)?;
    let user_ids = Enrollment::target_user_ids(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    let assigned = assign_users(&state, &ctx, id, user_ids, "targets").await?;
    Ok((StatusCode::OK, Json(assigned)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/enrollments",
    params(
        ("id" = Uuid, Path, description = "Course id"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Requested page", body = Page<Enrollment>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn course_enrollments_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let enrollments = Enrollment::page_by_course(state.pool(), id, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(enrollments)))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrollments/me",
    description = "The caller's courses with their progress",
    responses(
        (status = 200, description = "Enrolled courses", body = Vec<MyCourseResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn my_enrollments_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let rows = Enrollment::my_courses(state.pool(), user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    let courses: Vec<MyCourseResponse> = rows.into_iter().map(MyCourseResponse::from).collect();
    Ok((StatusCode::OK, Json(courses)))
}
