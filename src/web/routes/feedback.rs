use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        DatabaseError, ResourceType,
        entity::{Enrollment, Feedback, FeedbackCreate},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::courses::FeedbackPageResponse,
        error::ErrorResponse,
        routes::{PaginationQuery, validated, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Feedback;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/{id}/feedback",
            get(feedback_list_handler).post(feedback_create_handler),
        )
        .route("/courses/{id}/feedback/me", get(feedback_mine_handler))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/feedback",
    description = "Rates a course once. Requires a non-cancelled enrollment",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = FeedbackCreate,
    responses(
        (status = 201, description = "Feedback stored", body = Feedback),
        (status = 400, description = "Rating out of range", body = ErrorResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Feedback already submitted", body = ErrorResponse),
    ),
    tag = "feedback",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn feedback_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeedbackCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validated(RESOURCE, payload.validate())?;
    visible_course(&state, user, id).await?;

    let enrolled = Enrollment::find_active(state.pool(), id, user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::Enrollment, e))?;
    if enrolled.is_none() {
        return Err(WebError::resource_not_allowed(
            RESOURCE,
            "only enrolled learners can rate a course",
        ));
    }

    let feedback = Feedback::submit(state.pool(), id, user.user_id(), &payload)
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => {
                WebError::resource_conflict(RESOURCE, "feedback already submitted")
            }
            e => WebError::database(RESOURCE, e),
        })?;

    state.events().publish(LmsEvent::FeedbackSubmitted {
        course_id: id,
        user_id: user.user_id(),
        rating: feedback.rating(),
    });
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/feedback",
    params(
        ("id" = Uuid, Path, description = "Course id"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Newest feedback first, with the average rating", body = FeedbackPageResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "feedback",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn feedback_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    visible_course(&state, user, id).await?;

    let (items, average) = tokio::try_join!(
        Feedback::page_by_course(state.pool(), id, page.limit(), page.offset()),
        Feedback::average_rating(state.pool(), id),
    )
    .map_err(|e| WebError::database(RESOURCE, e))?;

    Ok((StatusCode::OK, Json(FeedbackPageResponse::new(items, average))))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/feedback/me",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "The caller's feedback", body = Feedback),
        (status = 404, description = "No feedback yet", body = ErrorResponse),
    ),
    tag = "feedback",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn feedback_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let feedback = Feedback::find_mine(state.pool(), id, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?
        .ok_or_else(|| WebError::resource_not_found(RESOURCE))?;
    Ok((StatusCode::OK, Json(feedback)))
}
