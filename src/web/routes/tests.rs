use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    events::LmsEvent,
    model::{
        CrudRepository, DatabaseError, Page, ResourceType, check_access,
        entity::{
            ATTEMPTS_EXHAUSTED, AuditAction, Course, CourseCreate, Enrollment, Question,
            QuestionCreate, Test, TestCreate, TestResult,
        },
        grading,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::tests::{QuestionResponse, ResultResponse, SubmitBody, TestDetailResponse},
        error::ErrorResponse,
        routes::{PaginationQuery, audit, fetch_or_404, require_enrollment, validated, visible_course},
    },
};

const RESOURCE: ResourceType = ResourceType::Test;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/{id}/tests",
            get(tests_list_handler).post(tests_create_handler),
        )
        .route(
            "/tests/{id}",
            get(tests_get_handler)
                .put(tests_update_handler)
                .delete(tests_delete_handler),
        )
        .route("/tests/{id}/questions", post(questions_create_handler))
        .route(
            "/questions/{id}",
            put(questions_update_handler).delete(questions_delete_handler),
        )
        .route("/tests/{id}/submit", post(tests_submit_handler))
        .route("/tests/{id}/results/me", get(my_results_handler))
        .route("/tests/{id}/results", get(test_results_handler))
        .route("/results/{id}", get(result_get_handler))
}

fn attempts_exhausted() -> WebError {
    WebError::resource_conflict(ResourceType::TestResult, "no attempts left for this test")
}

/// Test the caller may take: visible course and, for students, an active enrollment.
async fn taken_test(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<Test> {
    let test = fetch_or_404::<Test, TestCreate>(state, user, id).await?;
    visible_course(state, user, test.course_id()).await?;
    require_enrollment(state, user, test.course_id()).await?;
    Ok(test)
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/tests",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Tests of the course", body = Vec<Test>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    visible_course(&state, user, id).await?;
    let tests = Test::all_by_course(state.pool(), id)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(tests)))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/tests",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = TestCreate,
    responses(
        (status = 201, description = "Test created", body = Test),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<TestCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, payload.validate())?;
    let course = fetch_or_404::<Course, CourseCreate>(&state, user, id).await?;

    payload.course_id = course.id();
    payload
        .pass_score
        .get_or_insert(state.config().learning().default_pass_score());
    let created = Test::create(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    audit(
        &state,
        user,
        AuditAction::Create,
        RESOURCE,
        Some(created.id()),
        json!({ "course_id": course.id(), "title": created.title(), "pass_score": created.pass_score() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tests/{id}",
    description = "Test with its questions. Correct options are revealed to staff only",
    params(("id" = Uuid, Path, description = "Test id")),
    responses(
        (status = 200, description = "Test found", body = TestDetailResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let test = taken_test(&state, user, id).await?;

    let (questions, attempts_made) = tokio::try_join!(
        Question::all_by_test(state.pool(), test.id()),
        TestResult::attempt_count(state.pool(), test.id(), user.user_id()),
    )
    .map_err(|e| WebError::database(RESOURCE, e))?;

    let reveal = user.is_staff();
    let questions = questions
        .into_iter()
        .map(|q| QuestionResponse::new(q, reveal))
        .collect();
    Ok((
        StatusCode::OK,
        Json(TestDetailResponse::new(test, questions, attempts_made)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/tests/{id}",
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = TestCreate,
    responses(
        (status = 200, description = "Test updated", body = Test),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<TestCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    validated(RESOURCE, payload.validate())?;
    let found = fetch_or_404::<Test, TestCreate>(&state, user, id).await?;

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
        json!({ "title": updated.title(), "pass_score": updated.pass_score() }),
    )
    .await;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tests/{id}",
    params(("id" = Uuid, Path, description = "Test id")),
    responses(
        (status = 204, description = "Test deleted with its questions and results"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    let found = fetch_or_404::<Test, TestCreate>(&state, user, id).await?;
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

// Questions

#[utoipa::path(
    post,
    path = "/api/v1/tests/{id}/questions",
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = QuestionCreate,
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Invalid question", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn questions_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<QuestionCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(ResourceType::Question)?;
    validated(ResourceType::Question, payload.validate())?;
    let test = fetch_or_404::<Test, TestCreate>(&state, user, id).await?;

    payload.test_id = test.id();
    let created = Question::create(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::database(ResourceType::Question, e))?;

    audit(
        &state,
        user,
        AuditAction::Create,
        ResourceType::Question,
        Some(created.id()),
        json!({ "test_id": test.id() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/questions/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    request_body = QuestionCreate,
    responses(
        (status = 200, description = "Question updated", body = Question),
        (status = 400, description = "Invalid question", body = ErrorResponse),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn questions_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<QuestionCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(ResourceType::Question)?;
    validated(ResourceType::Question, payload.validate())?;
    let found = fetch_or_404::<Question, QuestionCreate>(&state, user, id).await?;

    payload.test_id = found.test_id();
    let updated = found
        .update(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::database(ResourceType::Question, e))?;

    audit(
        &state,
        user,
        AuditAction::Update,
        ResourceType::Question,
        Some(updated.id()),
        json!({ "test_id": updated.test_id() }),
    )
    .await;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/questions/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    tag = "tests",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn questions_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(ResourceType::Question)?;
    let found = fetch_or_404::<Question, QuestionCreate>(&state, user, id).await?;
    let test_id = found.test_id();
    found
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::database(ResourceType::Question, e))?;

    audit(
        &state,
        user,
        AuditAction::Delete,
        ResourceType::Question,
        Some(id),
        json!({ "test_id": test_id }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

// Submission & results

#[utoipa::path(
    post,
    path = "/api/v1/tests/{id}/submit",
    description = "Grades the answers and records a new attempt",
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = SubmitBody,
    responses(
        (status = 201, description = "Attempt graded", body = ResultResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
        (status = 409, description = "No attempts left", body = ErrorResponse),
    ),
    tag = "results",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn tests_submit_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let test = taken_test(&state, user, id).await?;

    let attempts_made = TestResult::attempt_count(state.pool(), test.id(), user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?;
    if test.attempts_exhausted(attempts_made) {
        return Err(attempts_exhausted());
    }

    let questions = Question::all_by_test(state.pool(), test.id())
        .await
        .map_err(|e| WebError::database(ResourceType::Question, e))?;
    let grade = grading::grade(&questions, &payload.answers, test.pass_score());

    let (result, answers) = TestResult::submit(state.pool(), user.user_id(), &test, &grade)
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(reason) if reason == ATTEMPTS_EXHAUSTED => attempts_exhausted(),
            e => WebError::database(ResourceType::TestResult, e),
        })?;

    tracing::info!(
        "user {} scored {} on test {} (attempt {})",
        user.user_id(),
        result.score(),
        test.id(),
        result.attempt_no()
    );

    let refreshed = Enrollment::refresh_status(state.pool(), test.course_id(), user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::Enrollment, e))?;

    state.events().publish(LmsEvent::TestSubmitted {
        test_id: test.id(),
        user_id: user.user_id(),
        score: result.score(),
        is_passed: result.is_passed(),
    });
    if let Some(enrollment) = refreshed {
        state.events().publish(LmsEvent::EnrollmentChanged {
            course_id: enrollment.course_id(),
            user_id: enrollment.user_id(),
            status: enrollment.status().as_str().to_string(),
        });
    }

    Ok((StatusCode::CREATED, Json(ResultResponse::new(result, answers))))
}

#[utoipa::path(
    get,
    path = "/api/v1/tests/{id}/results/me",
    params(("id" = Uuid, Path, description = "Test id")),
    responses(
        (status = 200, description = "The caller's attempts, oldest first", body = Vec<TestResult>),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "results",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn my_results_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let test = fetch_or_404::<Test, TestCreate>(&state, user, id).await?;
    let results = TestResult::mine(state.pool(), test.id(), user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?;
    Ok((StatusCode::OK, Json(results)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tests/{id}/results",
    params(
        ("id" = Uuid, Path, description = "Test id"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Requested page", body = Page<TestResult>),
        (status = 403, description = "Staff only", body = ErrorResponse),
        (status = 404, description = "Test not found", body = ErrorResponse),
    ),
    tag = "results",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn test_results_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(ResourceType::TestResult)?;
    let test = fetch_or_404::<Test, TestCreate>(&state, user, id).await?;
    let results = TestResult::page_by_test(state.pool(), test.id(), page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?;
    Ok((StatusCode::OK, Json(results)))
}

#[utoipa::path(
    get,
    path = "/api/v1/results/{id}",
    params(("id" = Uuid, Path, description = "Result id")),
    responses(
        (status = 200, description = "Attempt with its answers", body = ResultResponse),
        (status = 403, description = "Neither owner nor staff", body = ErrorResponse),
        (status = 404, description = "Result not found", body = ErrorResponse),
    ),
    tag = "results",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn result_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let result = TestResult::find(state.pool(), id)
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?
        .ok_or_else(|| WebError::resource_not_found(ResourceType::TestResult))?;
    check_access(state.pool(), user, &result, user.user_id())
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?;

    let answers = result
        .answers(state.pool())
        .await
        .map_err(|e| WebError::database(ResourceType::TestResult, e))?;
    Ok((StatusCode::OK, Json(ResultResponse::new(result, answers))))
}
