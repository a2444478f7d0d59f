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
    auth::hash_password,
    model::{
        CrudRepository, DatabaseError, ResourceType, check_access,
        entity::{AuditAction, UserEntity, UserEntityCreateUpdate, UserFilter},
    },
    web::{
        AppState, RequestContext, UserRole, WebError, WebResult,
        dto::users::{UserCreateBody, UserUpdateBody, validate_password, validate_username},
        error::ErrorResponse,
        routes::{PaginationQuery, audit, fetch_or_404, validated},
    },
};

const RESOURCE: ResourceType = ResourceType::User;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users_list_handler).post(users_create_handler))
        .route(
            "/users/{id}",
            get(users_get_handler)
                .put(users_update_handler)
                .delete(users_delete_handler),
        )
}

fn map_user_error(e: DatabaseError) -> WebError {
    match e {
        DatabaseError::Conflict(_) => WebError::resource_conflict(RESOURCE, "username already taken"),
        e => WebError::database(RESOURCE, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    description = "Lists users, filtered by department, role or a search term",
    params(
        PaginationQuery,
        ("department_id" = Option<Uuid>, Query, description = "Department filter"),
        ("role" = Option<UserRole>, Query, description = "Role filter"),
        ("search" = Option<String>, Query, description = "Matches username, full name or email"),
    ),
    responses(
        (status = 200, description = "Requested page", body = crate::model::Page<UserEntity>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    tag = "users",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn users_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<UserFilter>,
) -> WebResult<impl IntoResponse> {
    ctx.staff(RESOURCE)?;
    let users = UserEntity::search(state.pool(), &filter, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = UserCreateBody,
    responses(
        (status = 201, description = "User created", body = UserEntity),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Staff only; admins are created by admins", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
    ),
    tag = "users",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn users_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<UserCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    if payload.role == UserRole::Admin {
        ctx.admin_only(RESOURCE)?;
    }
    validated(RESOURCE, validate_username(&payload.username))?;
    validated(RESOURCE, validate_password(&payload.password))?;

    let data = UserEntityCreateUpdate {
        username: payload.username,
        full_name: payload.full_name,
        email: payload.email,
        password_hash: hash_password(&payload.password).map_err(WebError::server_crypt_error)?,
        role: payload.role,
        department_id: payload.department_id,
        employee_level_id: payload.employee_level_id,
        is_active: true,
    };
    let created = UserEntity::create(state.pool(), user, data)
        .await
        .map_err(map_user_error)?;

    audit(
        &state,
        user,
        AuditAction::Create,
        RESOURCE,
        Some(created.id()),
        json!({ "username": created.username(), "role": created.role() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserEntity),
        (status = 403, description = "Neither self nor staff", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "users",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn users_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = fetch_or_404::<UserEntity, UserEntityCreateUpdate>(&state, user, id).await?;
    check_access(state.pool(), user, &found, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;
    Ok((StatusCode::OK, Json(found)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateBody,
    responses(
        (status = 200, description = "User updated", body = UserEntity),
        (status = 403, description = "Not allowed to change these fields", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
    ),
    tag = "users",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn users_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = fetch_or_404::<UserEntity, UserEntityCreateUpdate>(&state, user, id).await?;
    check_access(state.pool(), user, &found, user.user_id())
        .await
        .map_err(|e| WebError::database(RESOURCE, e))?;

    if !user.is_staff() && payload.touches_privileged_fields() {
        return Err(WebError::resource_not_allowed(
            RESOURCE,
            "only staff may change role, department, level or activation",
        ));
    }
    let grants_admin = payload.role == Some(UserRole::Admin);
    let edits_other_admin = found.role() == UserRole::Admin && found.id() != user.user_id();
    if grants_admin || edits_other_admin {
        ctx.admin_only(RESOURCE)?;
    }

    let mut data = found.to_update();
    if let Some(username) = payload.username {
        validated(RESOURCE, validate_username(&username))?;
        data.username = username;
    }
    if let Some(password) = payload.password {
        validated(RESOURCE, validate_password(&password))?;
        data.password_hash = hash_password(&password).map_err(WebError::server_crypt_error)?;
    }
    if let Some(full_name) = payload.full_name {
        data.full_name = full_name;
    }
    if let Some(email) = payload.email {
        data.email = email;
    }
    if let Some(role) = payload.role {
        data.role = role;
    }
    if let Some(department_id) = payload.department_id {
        data.department_id = department_id;
    }
    if let Some(employee_level_id) = payload.employee_level_id {
        data.employee_level_id = employee_level_id;
    }
    if let Some(is_active) = payload.is_active {
        data.is_active = is_active;
    }

    let updated = found
        .update(state.pool(), user, data)
        .await
        .map_err(map_user_error)?;

    if user.is_staff() {
        audit(
            &state,
            user,
            AuditAction::Update,
            RESOURCE,
            Some(updated.id()),
            json!({ "username": updated.username(), "role": updated.role(), "is_active": updated.is_active() }),
        )
        .await;
    }

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Staff only; admins cannot delete themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "users",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn users_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.staff(RESOURCE)?;
    if id == user.user_id() {
        return Err(WebError::resource_not_allowed(RESOURCE, "you cannot delete yourself"));
    }

    let found = fetch_or_404::<UserEntity, UserEntityCreateUpdate>(&state, user, id).await?;
    if found.role() == UserRole::Admin {
        ctx.admin_only(RESOURCE)?;
    }
    let username = found.username().to_string();
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
        json!({ "username": username }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
