//! Departments, employee levels, course categories and document types.
//! All four share one set of generic handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, DatabaseError, PaginatableRepository, ResourceTyped,
        entity::{AuditAction, CourseCategory, Department, EmployeeLevel, LookupCreate, NamedLookup, TypeDocument},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        routes::{PaginationQuery, audit, fetch_or_404},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(lookup_routes::<Department>("/departments"))
        .merge(lookup_routes::<EmployeeLevel>("/employee-levels"))
        .merge(lookup_routes::<CourseCategory>("/course-categories"))
        .merge(lookup_routes::<TypeDocument>("/type-documents"))
}

fn lookup_routes<T>(base: &str) -> Router<AppState>
where
    T: NamedLookup
        + CrudRepository<T, LookupCreate, Uuid>
        + PaginatableRepository<T, LookupCreate, Uuid>
        + ResourceTyped
        + Serialize
        + Send
        + Sync
        + 'static,
{
    Router::new()
        .route(base, get(lookup_list::<T>).post(lookup_create::<T>))
        .route(
            &format!("{base}/{{id}}"),
            get(lookup_get::<T>)
                .put(lookup_update::<T>)
                .delete(lookup_delete::<T>),
        )
}

fn validate(data: &LookupCreate) -> Result<(), String> {
    if data.name.trim().is_empty() {
        return Err("name must not be empty".into());
    }
    Ok(())
}

fn map_lookup_error<T: ResourceTyped>(e: DatabaseError) -> WebError {
    match e {
        DatabaseError::Conflict(_) => {
            WebError::resource_conflict(T::get_resource_type(), "name already taken")
        }
        e => WebError::database(T::get_resource_type(), e),
    }
}

async fn lookup_list<T>(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse>
where
    T: CrudRepository<T, LookupCreate, Uuid>
        + PaginatableRepository<T, LookupCreate, Uuid>
        + ResourceTyped
        + Serialize,
{
    let user = ctx.user()?;
    let items = T::page(state.pool(), user, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(T::get_resource_type(), e))?;
    Ok((StatusCode::OK, Json(items)))
}

async fn lookup_get<T>(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse>
where
    T: CrudRepository<T, LookupCreate, Uuid> + ResourceTyped + Serialize,
{
    let user = ctx.user()?;
    let found = fetch_or_404::<T, LookupCreate>(&state, user, id).await?;
    Ok((StatusCode::OK, Json(found)))
}

async fn lookup_create<T>(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<LookupCreate>,
) -> WebResult<impl IntoResponse>
where
    T: NamedLookup + CrudRepository<T, LookupCreate, Uuid> + ResourceTyped + Serialize,
{
    let user = ctx.staff(T::get_resource_type())?;
    validate(&payload).map_err(|r| WebError::resource_bad_request(T::get_resource_type(), r))?;

    let created = T::create(state.pool(), user, payload)
        .await
        .map_err(map_lookup_error::<T>)?;

    audit(
        &state,
        user,
        AuditAction::Create,
        T::get_resource_type(),
        Some(created.id()),
        json!({ "name": created.name() }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn lookup_update<T>(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LookupCreate>,
) -> WebResult<impl IntoResponse>
where
    T: NamedLookup + CrudRepository<T, LookupCreate, Uuid> + ResourceTyped + Serialize,
{
    let user = ctx.staff(T::get_resource_type())?;
    validate(&payload).map_err(|r| WebError::resource_bad_request(T::get_resource_type(), r))?;

    let found = fetch_or_404::<T, LookupCreate>(&state, user, id).await?;
    let updated = found
        .update(state.pool(), user, payload)
        .await
        .map_err(map_lookup_error::<T>)?;

    audit(
        &state,
        user,
        AuditAction::Update,
        T::get_resource_type(),
        Some(updated.id()),
        json!({ "name": updated.name() }),
    )
    .await;

    Ok((StatusCode::OK, Json(updated)))
}

async fn lookup_delete<T>(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse>
where
    T: NamedLookup + CrudRepository<T, LookupCreate, Uuid> + ResourceTyped,
{
    let user = ctx.staff(T::get_resource_type())?;
    let found = fetch_or_404::<T, LookupCreate>(&state, user, id).await?;
    let name = found.name().to_string();
    found
        .delete(state.pool(), user)
        .await
        .map_err(|e| WebError::database(T::get_resource_type(), e))?;

    audit(
        &state,
        user,
        AuditAction::Delete,
        T::get_resource_type(),
        Some(id),
        json!({ "name": name }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
