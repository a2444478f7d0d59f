//! Append-only record of administrative actions. Rows are only ever inserted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, Page, ResourceType, error::DatabaseResult};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Assign,
    Issue,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Assign => "assign",
            Self::Issue => "issue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct AuditLog {
    id: Uuid,
    actor_id: Uuid,
    action: String,
    entity_type: String,
    entity_id: Option<Uuid>,
    #[schema(value_type = Object)]
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ResourceTyped for AuditLog {
    fn get_resource_type() -> ResourceType {
        ResourceType::AuditLog
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub action: Option<String>,
}

impl AuditLog {
    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        self.entity_id
    }

    pub fn details(&self) -> &serde_json::Value {
        &self.details
    }

    #[tracing::instrument(skip(mm, details))]
    pub async fn record(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        action: AuditAction,
        entity_type: ResourceType,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(action.as_str())
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(details)
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    pub async fn search(
        mm: &ModelManager,
        filter: &AuditLogFilter,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<Self>> {
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::text IS NULL OR action = $3)
        "#;

        let items = sqlx::query_as(&format!(
            "SELECT * FROM audit_logs {where_clause} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.actor_id)
        .bind(&filter.entity_type)
        .bind(&filter.action)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs {where_clause}"))
                .bind(filter.actor_id)
                .bind(&filter.entity_type)
                .bind(&filter.action)
                .fetch_one(mm.executor())
                .await?;

        Ok(Page::new(items, total, limit, offset))
    }
}
