use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Course material stored by URL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct AttachedFile {
    id: Uuid,
    course_id: Uuid,
    type_document_id: Option<Uuid>,
    file_name: String,
    file_url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AttachedFileCreate {
    #[serde(skip)]
    pub course_id: Uuid,
    pub type_document_id: Option<Uuid>,
    pub file_name: String,
    pub file_url: String,
}

impl ResourceTyped for AttachedFile {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::AttachedFile
    }
}

impl AttachedFile {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_url(&self) -> &str {
        &self.file_url
    }

    pub async fn create(mm: &ModelManager, data: AttachedFileCreate) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO course_attached_files (id, course_id, type_document_id, file_name, file_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.course_id)
        .bind(data.type_document_id)
        .bind(data.file_name.trim())
        .bind(data.file_url.trim())
        .fetch_one(mm.executor())
        .await?;
        Ok(row)
    }

    pub async fn find(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM course_attached_files WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    pub async fn all_by_course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            "SELECT * FROM course_attached_files WHERE course_id = $1 ORDER BY created_at",
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn delete(self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM course_attached_files WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HasOwner for AttachedFile {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.course_id)
    }
}
