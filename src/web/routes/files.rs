use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    model::{
        ResourceType,
        entity::{AttachedFile, AttachedFileCreate, AuditAction, Course, CourseCreate},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        error::ErrorResponse,
        routes::{audit, fetch_or_404, validated, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::AttachedFile;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/{id}/files",
            get(files_list_handler).post(files_create_handler),
        )
        .route("/files/{id}", delete(files_delete_handler))
}

fn validate(data: &AttachedFileCreate) -> Result<(), String> {
    if data.file_name.trim().is_empty() || data.file_url.trim().is_empty() {
        return Err("file_name and file_url must not be empty".into());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/files",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Attached documents", body = Vec<AttachedFile>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "files",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn files_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    visible_course(&state, user, id).await?;
    let files = AttachedFile::all_by_course(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(files)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/files",
    description = "Attaches a document link to the course",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = AttachedFileCreate,
    responses(
        (status = 201, description = "File attached", body = AttachedFile),
        (status = 400, description = "Invalid payload or unknown document type", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "files",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn files_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<AttachedFileCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, validate(&payload))?;
    let course = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;

    payload.course_id = course.id();
    let created = AttachedFile::create(state.pool(), payload)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        &state,
        user,
        AuditAction::Create,
        RESOURCE,
        Some(created.id()),
        json!({ "course_id": course.id(), "file_name": created.file_name() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    params(("id" = Uuid, Path, description = "Attached file id")),
    responses(
        (status = 204, description = "File detached"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    tag = "files",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn files_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    let found = AttachedFile::find(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
        .ok_or_else(|| WebError::resource_not_found(RESOURCE))?;

    let details = json!({ "course_id": found.course_id(), "file_name": found.file_name() });
    found
        .delete(state.pool())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(&state, user, AuditAction::Delete, RESOURCE, Some(id), details).await;

    Ok(StatusCode::NO_CONTENT)
}
