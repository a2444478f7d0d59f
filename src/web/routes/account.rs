use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Duration;
use tower_cookies::{Cookie, Cookies, cookie::SameSite};

use crate::{
    auth::{self, UserClaims, hash_password, verify_password},
    model::{CrudRepository, ResourceTyped, entity::{UserEntity, UserEntityCreateUpdate}},
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::users::{PasswordChangeBody, SigninBody, validate_password},
        error::ErrorResponse,
        middlewares::AUTH_TOKEN,
        routes::{fetch_or_404, validated},
    },
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/account/signin", post(account_signin_handler))
        .route("/account/signout", post(account_signout_handler))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/account/me", get(account_me_handler))
        .route("/account/password", put(account_password_handler))
}

fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_TOKEN, token);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie
}

#[utoipa::path(
    post,
    path = "/api/v1/account/signin",
    description = "Authorizes user in the system",
    request_body = SigninBody,
    responses(
        (status = 200, description = "User signed in", body = UserEntity),
        (status = 401, description = "Credentials invalid or account deactivated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "account",
)]
pub(crate) async fn account_signin_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SigninBody>,
) -> WebResult<impl IntoResponse> {
    let admin = AuthenticatedUser::admin();
    let found = UserEntity::find_by_username(state.pool(), &admin, &payload.username)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let Some(found) = found.filter(UserEntity::is_active) else {
        return Err(WebError::auth_invalid_credentials());
    };

    let is_verified =
        verify_password(found.hash(), &payload.password).map_err(WebError::server_crypt_error)?;
    if !is_verified {
        return Err(WebError::auth_invalid_credentials());
    }

    let app = state.config().app();
    let claims = UserClaims::for_user(found.id(), Duration::hours(app.token_ttl_hours()));
    let token = auth::generate_token(claims, app.jwt())
        .map_err(|e| WebError::server_crypt_error(e.into()))?;
    cookies.add(session_cookie(token));

    tracing::info!("user {} signed in", found.username());
    Ok((StatusCode::OK, Json(found)))
}

#[utoipa::path(
    post,
    path = "/api/v1/account/signout",
    description = "Drops the session cookie",
    responses(
        (status = 204, description = "Signed out"),
    ),
    tag = "account",
)]
pub(crate) async fn account_signout_handler(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(session_cookie(String::new()));
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/api/v1/account/me",
    description = "Returns the signed in user",
    responses(
        (status = 200, description = "Current user", body = UserEntity),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "account",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn account_me_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let me = fetch_or_404::<UserEntity, UserEntityCreateUpdate>(&state, user, user.user_id()).await?;
    Ok((StatusCode::OK, Json(me)))
}

#[utoipa::path(
    put,
    path = "/api/v1/account/password",
    description = "Changes the password of the signed in user",
    request_body = PasswordChangeBody,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password rejected", body = ErrorResponse),
        (status = 401, description = "Current password invalid", body = ErrorResponse),
    ),
    tag = "account",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn account_password_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<PasswordChangeBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    validated(
        UserEntity::get_resource_type(),
        validate_password(&payload.new_password),
    )?;

    let me = fetch_or_404::<UserEntity, UserEntityCreateUpdate>(&state, user, user.user_id()).await?;
    let is_verified = verify_password(me.hash(), &payload.current_password)
        .map_err(WebError::server_crypt_error)?;
    if !is_verified {
        return Err(WebError::auth_invalid_credentials());
    }

    let mut data = me.to_update();
    data.password_hash =
        hash_password(&payload.new_password).map_err(WebError::server_crypt_error)?;
    me.update(state.pool(), user, data)
        .await
        .map_err(|e| WebError::database(UserEntity::get_resource_type(), e))?;

    Ok(StatusCode::NO_CONTENT)
}
