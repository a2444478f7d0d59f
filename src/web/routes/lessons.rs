use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        CrudRepository, ResourceType,
        entity::{
            AuditAction, Course, CourseCreate, Enrollment, Lesson, LessonCreate, LessonProgress,
            LessonWithProgressRow, ProgressUpdate,
        },
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{lessons::LessonDetailResponse, progress::ProgressResponse},
        error::ErrorResponse,
        routes::{audit, fetch_or_404, require_enrollment, validated, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Lesson;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/{id}/lessons",
            get(lessons_list_handler).post(lessons_create_handler),
        )
        .route(
            "/lessons/{id}",
            get(lessons_get_handler)
                .put(lessons_update_handler)
                .delete(lessons_delete_handler),
        )
        .route(
            "/lessons/{id}/progress",
            get(progress_get_handler).put(progress_put_handler),
        )
        .route("/lessons/{id}/progress/beacon", post(progress_beacon_handler))
}

fn validate(data: &LessonCreate) -> Result<(), String> {
    if data.title.trim().is_empty() {
        return Err("title must not be empty".into());
    }
    if data.duration_seconds < 0 || data.page_count < 0 {
        return Err("duration and page count must not be negative".into());
    }
    Ok(())
}

/// Lesson the caller may study: the course must be visible and, for
/// students, actively enrolled.
async fn studied_lesson(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Lesson> {
    let lesson = fetch_or_404::<Lesson, LessonCreate>(state, user, id).await?;
    visible_course(state, user, lesson.course_id()).await?;
    require_enrollment(state, user, lesson.course_id()).await?;
    Ok(lesson)
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/lessons",
    description = "Course outline ordered by `order_index`, with the caller's progress",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Lessons", body = Vec<LessonWithProgressRow>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "lessons",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn lessons_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    visible_course(&state, user, id).await?;
    let lessons = LessonWithProgressRow::fetch_by_course(state.pool(), user, id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(lessons)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/lessons",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = LessonCreate,
    responses(
        (status = 201, description = "Lesson created", body = Lesson),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "lessons",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn lessons_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<LessonCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, validate(&payload))?;
    let course = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;

    payload.course_id = course.id();
    let created = Lesson::create(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        &state,
        user,
        AuditAction::Create,
        RESOURCE,
        Some(created.id()),
        json!({ "course_id": course.id(), "title": created.title() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}",
    description = "Lesson content with the caller's progress. Students need an active enrollment",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson found", body = LessonDetailResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    tag = "lessons",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn lessons_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = studied_lesson(&state, user, id).await?;
    let progress = LessonProgress::find_or_empty(state.pool(), user.user_id(), lesson.id())
        .await
        .map_err(|e| WebError::database(ResourceType::LessonProgress, e))?;
    Ok((
        StatusCode::OK,
        Json(LessonDetailResponse::new(lesson, progress.into())),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = LessonCreate,
    responses(
        (status = 200, description = "Lesson updated", body = Lesson),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    tag = "lessons",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn lessons_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<LessonCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, validate(&payload))?;
    let found = fetch_or_404::<Lesson, LessonCreate>(&state, user, id).await?;

    payload.course_id = found.course_id();
    let updated = found
        .update(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        &state,
        user,
        AuditAction::Update,
        RESOURCE,
        Some(updated.id()),
        json!({ "title": updated.title() }),
    )
    .await;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    tag = "lessons",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn lessons_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    let found = fetch_or_404::<Lesson, LessonCreate>(&state, user, id).await?;
    let course_id = found.course_id();
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
        json!({ "course_id": course_id }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

// Progress

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}/progress",
    description = "Stored progress, or a zero row when the lesson was never opened",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Progress", body = ProgressResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    tag = "progress",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn progress_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = studied_lesson(&state, user, id).await?;
    let progress = LessonProgress::find_or_empty(state.pool(), user.user_id(), lesson.id())
        .await
        .map_err(|e| WebError::database(ResourceType::LessonProgress, e))?;
    Ok((StatusCode::OK, Json(ProgressResponse::from(progress))))
}

async fn save_progress(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
    update: &ProgressUpdate,
) -> WebResult<LessonProgress> {
    let lesson = studied_lesson(state, user, id).await?;
    let ratio = state.config().learning().video_completion_ratio();

    let saved = LessonProgress::save(state.pool(), user.user_id(), &lesson, update, ratio)
        .await
        .map_err(|e| WebError::database(ResourceType::LessonProgress, e))?;

    let refreshed = Enrollment::refresh_status(state.pool(), lesson.course_id(), user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::Enrollment, e))?;

    state.events().publish(LmsEvent::LessonProgressSaved {
        lesson_id: lesson.id(),
        user_id: user.user_id(),
        is_completed: saved.is_completed(),
    });
    if let Some(enrollment) = refreshed {
        state.events().publish(LmsEvent::EnrollmentChanged {
            course_id: enrollment.course_id(),
            user_id: enrollment.user_id(),
            status: enrollment.status().as_str().to_string(),
        });
    }

    Ok(saved)
}

#[utoipa::path(
    put,
    path = "/api/v1/lessons/{id}/progress",
    description = "Reports the player position. Completion never reverts",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Progress saved", body = ProgressResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    tag = "progress",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn progress_put_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressUpdate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let saved = save_progress(&state, user, id, &payload).await?;
    Ok((StatusCode::OK, Json(ProgressResponse::from(saved))))
}

#[utoipa::path(
    post,
    path = "/api/v1/lessons/{id}/progress/beacon",
    description = "Same as the progress update, accepting any content type. Sent by the page-hide beacon",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body(content = ProgressUpdate, content_type = "text/plain"),
    responses(
        (status = 204, description = "Progress saved"),
        (status = 400, description = "Body is not a progress report", body = ErrorResponse),
    ),
    tag = "progress",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn progress_beacon_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let update: ProgressUpdate = serde_json::from_slice(&body).map_err(|e| {
        WebError::resource_bad_request(ResourceType::LessonProgress, e.to_string())
    })?;
    save_progress(&state, user, id, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}
