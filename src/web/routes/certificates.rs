use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        Page, ResourceType, check_access,
        entity::{AuditAction, Certificate, CertificateRow, CourseCompletion, Enrollment},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        error::ErrorResponse,
        routes::{PaginationQuery, audit, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Certificate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/certificate", post(certificate_issue_handler))
        .route("/certificates", get(certificates_list_handler))
        .route("/certificates/me", get(certificates_mine_handler))
        .route("/certificates/{id}", get(certificate_get_handler))
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CertificateFilter {
    /// Only certificates of this course
    course_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/certificate",
    description = "Issues the caller's certificate once every lesson is completed and every test passed. \
                   Issuing again returns the stored certificate",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Certificate issued", body = Certificate),
        (status = 200, description = "Certificate already issued", body = Certificate),
        (status = 400, description = "Course not completed yet", body = ErrorResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "certificates",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn certificate_issue_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = visible_course(&state, user, id).await?;

    // a stored certificate stays valid when the course grows new content
    if let Some(existing) = Certificate::find_for(state.pool(), user.user_id(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let enrollment = Enrollment::find_active(state.pool(), id, user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::Enrollment, e))?
        .ok_or_else(|| {
            WebError::resource_not_allowed(RESOURCE, "an active enrollment in this course is required")
        })?;

    let completion = CourseCompletion::fetch(state.pool(), id, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    if !completion.is_complete() {
        return Err(WebError::resource_bad_request(
            RESOURCE,
            format!(
                "course not completed: {}/{} lessons, {}/{} tests passed",
                completion.completed_lessons,
                completion.total_lessons,
                completion.passed_tests,
                completion.total_tests
            ),
        ));
    }

    let (certificate, enrollment, created) = Certificate::issue(state.pool(), &enrollment)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    if !created {
        return Ok((StatusCode::OK, Json(certificate)));
    }

    tracing::info!(
        "certificate {} issued to {} for {}",
        certificate.certificate_code(),
        user.user_id(),
        course.code()
    );
    audit(
        &state,
        user,
        AuditAction::Issue,
        RESOURCE,
        Some(certificate.id()),
        json!({ "course_id": id, "certificate_code": certificate.certificate_code() }),
    )
    .await;

    state.events().publish(LmsEvent::CertificateIssued {
        course_id: id,
        user_id: user.user_id(),
        certificate_id: certificate.id(),
    });
    state.events().publish(LmsEvent::EnrollmentChanged {
        course_id: id,
        user_id: user.user_id(),
        status: enrollment.status().as_str().to_string(),
    });

    Ok((StatusCode::CREATED, Json(certificate)))
}

#[utoipa::path(
    get,
    path = "/api/v1/certificates/me",
    responses(
        (status = 200, description = "The caller's certificates, newest first", body = Vec<CertificateRow>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "certificates",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn certificates_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let rows = Certificate::mine(state.pool(), user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/certificates/{id}",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate found", body = CertificateRow),
        (status = 403, description = "Neither holder nor staff", body = ErrorResponse),
        (status = 404, description = "Certificate not found", body = ErrorResponse),
    ),
    tag = "certificates",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn certificate_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let certificate = Certificate::find(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
        .ok_or_else(|| WebError::resource_not_found(RESOURCE))?;
    check_access(state.pool(), user, &certificate, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    let row = Certificate::find_row(state.pool(), certificate.id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
        .ok_or_else(|| WebError::resource_not_found(RESOURCE))?;
    Ok((StatusCode::OK, Json(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/certificates",
    params(PaginationQuery, CertificateFilter),
    responses(
        (status = 200, description = "Requested page", body = Page<CertificateRow>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    tag = "certificates",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn certificates_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<CertificateFilter>,
) -> WebResult<impl IntoResponse> {
    ctx.staff(RESOURCE)?;
    let rows = Certificate::page(state.pool(), filter.course_id, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(rows)))
}
