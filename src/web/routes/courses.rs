use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        CrudRepository, DatabaseError, Page, ResourceType,
        entity::{
            AttachedFile, AuditAction, Course, CourseCreate, CourseFilter, CourseStatus, Enrollment,
            Feedback, LessonWithProgressRow, Test,
        },
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::courses::CourseDetailResponse,
        error::ErrorResponse,
        routes::{PaginationQuery, audit, fetch_or_404, validated, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Course;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(courses_list_handler).post(courses_create_handler))
        .route(
            "/courses/{id}",
            get(courses_get_handler)
                .put(courses_update_handler)
                .delete(courses_delete_handler),
        )
}

fn validate(data: &CourseCreate) -> Result<(), String> {
    if data.code.trim().is_empty() {
        return Err("code must not be empty".into());
    }
    if data.title.trim().is_empty() {
        return Err("title must not be empty".into());
    }
    Ok(())
}

fn map_course_error(e: DatabaseError) -> WebError {
    match e {
        DatabaseError::Conflict(_) => WebError::resource_conflict(RESOURCE, "course code already taken"),
        e => WebError::database(RESOURCE, e),
    }
}

fn changed(state: &AppState, course_id: Uuid, action: AuditAction) {
    state.events().publish(LmsEvent::CourseChanged {
        course_id,
        action: action.as_str().to_string(),
    });
}

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    description = "Course catalog. Students only ever see published courses",
    params(
        PaginationQuery,
        ("category_id" = Option<Uuid>, Query, description = "Category filter"),
        ("status" = Option<CourseStatus>, Query, description = "Status filter, staff only"),
        ("search" = Option<String>, Query, description = "Matches title or code"),
    ),
    responses(
        (status = 200, description = "Requested page", body = Page<Course>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn courses_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<CourseFilter>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let courses = Course::search(state.pool(), user, &filter, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with its outline", body = CourseDetailResponse),
        (status = 404, description = "Course not found or not published", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn courses_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = visible_course(&state, user, id).await?;
    let mm = state.pool();

    let (targets, lessons, tests, files, enrollment, average_rating) = tokio::try_join!(
        course.targets(mm),
        LessonWithProgressRow::fetch_by_course(mm, user, id),
        Test::all_by_course(mm, id),
        AttachedFile::all_by_course(mm, id),
        Enrollment::find(mm, id, user.user_id()),
        Feedback::average_rating(mm, id),
    )
    .map_err(|e| WebError::database(RESOURCE, e))?;

    let detail = CourseDetailResponse {
        course,
        targets,
        lessons,
        tests,
        files,
        enrollment,
        average_rating,
    };
    Ok((StatusCode::OK, Json(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses",
    request_body = CourseCreate,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 409, description = "Code taken", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn courses_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, validate(&payload))?;

    let created = Course::create(state.pool(), user, payload)
        .await
        .map_err(map_course_error)?;

    audit(
        &state,
        user,
        AuditAction::Create,
        RESOURCE,
        Some(created.id()),
        json!({ "code": created.code(), "title": created.title() }),
    )
    .await;
    changed(&state, created.id(), AuditAction::Create);

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CourseCreate,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Code taken", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn courses_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, validate(&payload))?;

    let found = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let updated = found
        .update(state.pool(), user, payload)
        .await
        .map_err(map_course_error)?;

    audit(
        &state,
        user,
        AuditAction::Update,
        RESOURCE,
        Some(updated.id()),
        json!({ "code": updated.code(), "status": updated.status() }),
    )
    .await;
    changed(&state, updated.id(), AuditAction::Update);

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    description = "Deletes the course with its lessons, tests, files, enrollments, feedback and certificates",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn courses_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    let found = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;
    let code = found.code().to_string();
    found
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        &state,
        user,
        AuditAction::Delete,
        RESOURCE,
        Some(id),
        json!({ "code": code }),
    )
    .await;
    changed(&state, id, AuditAction::Delete);

    Ok(StatusCode::NO_CONTENT)
}
