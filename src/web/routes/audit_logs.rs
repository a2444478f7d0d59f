use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{
    model::{
        Page, ResourceType,
        entity::{AuditLog, AuditLogFilter},
    },
    web::{
        AppState, RequestContext, WebError, WebResult, error::ErrorResponse,
        routes::PaginationQuery,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(audit_logs_list_handler))
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    description = "Append-only trail of staff mutations, newest first",
    params(
        PaginationQuery,
        ("actor_id" = Option<Uuid>, Query, description = "Actor filter"),
        ("entity_type" = Option<String>, Query, description = "e.g. `course`, `user`"),
        ("action" = Option<String>, Query, description = "e.g. `create`, `assign`"),
    ),
    responses(
        (status = 200, description = "Requested page", body = Page<AuditLog>),
        (status = 403, description = "Staff only", body = ErrorResponse),
    ),
    tag = "audit",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn audit_logs_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
    Query(filter): Query<AuditLogFilter>,
) -> WebResult<impl IntoResponse> {
    ctx.staff(ResourceType::AuditLog)?;
    let logs = AuditLog::search(state.pool(), &filter, page.limit(), page.offset())
        .await
        .map_err(|e| WebError::database(ResourceType::AuditLog, e))?;
    Ok((StatusCode::OK, Json(logs)))
}
