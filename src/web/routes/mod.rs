use axum::{Router, middleware};
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::{
    error::log_error,
    model::{
        CrudRepository, ResourceType, ResourceTyped,
        entity::{AuditAction, AuditLog, Course, CourseCreate, Enrollment},
    },
    web::{AppState, AuthenticatedUser, WebError, WebResult, doc::ApiDoc, middlewares},
};

pub mod account;
pub mod audit_logs;
pub mod certificates;
pub mod courses;
pub mod enrollments;
pub mod events;
pub mod feedback;
pub mod files;
pub mod lessons;
pub mod lookups;
pub mod reports;
pub mod tests;
pub mod users;

pub use crate::web::dto::common::PaginationQuery;

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(account::protected_routes())
        .merge(users::routes())
        .merge(lookups::routes())
        .merge(courses::routes())
        .merge(enrollments::routes())
        .merge(lessons::routes())
        .merge(tests::routes())
        .merge(files::routes())
        .merge(feedback::routes())
        .merge(certificates::routes())
        .merge(audit_logs::routes())
        .merge(reports::routes())
        .merge(events::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ));

    let api = Router::new()
        .merge(account::public_routes())
        .merge(protected);

    let mut router = Router::new()
        .nest("/api/v1", api)
        .layer(CookieManagerLayer::default())
        .layer(CorsLayer::very_permissive());

    if state.config().app().docs() {
        router = router
            .merge(SwaggerUi::new("/api/v1/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));
    }

    router.with_state(state)
}

// Shared handler helpers

/// Loads `id` or fails with 404.
pub(crate) async fn fetch_or_404<T, C>(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<T>
where
    T: CrudRepository<T, C, Uuid> + ResourceTyped,
{
    T::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::database(T::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(T::get_resource_type()))
}

/// Course the caller may see. Unpublished courses do not exist for students.
pub(crate) async fn visible_course(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Course> {
    let course = fetch_or_404::<Course, CourseCreate>(state, user, id).await?;
    if !user.is_staff() && !course.is_published() {
        return Err(WebError::resource_not_found(ResourceType::Course));
    }
    Ok(course)
}

/// Students need an active enrollment; staff pass through with `None`.
pub(crate) async fn require_enrollment(
    state: &AppState,
    user: &AuthenticatedUser,
    course_id: Uuid,
) -> WebResult<Option<Enrollment>> {
    let enrollment = Enrollment::find_active(state.pool(), course_id, user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::Enrollment, e))?;

    match enrollment {
        Some(enrollment) => Ok(Some(enrollment)),
        None if user.is_staff() => Ok(None),
        None => Err(WebError::resource_not_allowed(
            ResourceType::Enrollment,
            "an active enrollment in this course is required",
        )),
    }
}

/// Appends to the audit log. A failed write is logged, the request still succeeds.
pub(crate) async fn audit(
    state: &AppState,
    actor: &AuthenticatedUser,
    action: AuditAction,
    entity_type: ResourceType,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
) {
    if let Err(e) =
        AuditLog::record(state.pool(), actor, action, entity_type, entity_id, details).await
    {
        log_error(&e);
    }
}

/// Rejects a payload that failed its own validation.
pub(crate) fn validated(r#type: ResourceType, result: Result<(), String>) -> WebResult<()> {
    result.map_err(|reason| WebError::resource_bad_request(r#type, reason))
}
