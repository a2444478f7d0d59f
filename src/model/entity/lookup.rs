//! Named lookup tables: departments, employee levels, course categories and
//! document types. They share one shape, so the entity and its repository are
//! generated by [`named_lookup!`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LookupCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl LookupCreate {
    pub fn new<S: Into<String>>(name: S, description: S) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Common read access used by the generic lookup routes.
pub trait NamedLookup {
    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn created_at(&self) -> &DateTime<Utc>;
}

macro_rules! named_lookup {
    ($ent:ident, $table:literal, $resource:ident) => {
        #[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
        pub struct $ent {
            id: Uuid,
            name: String,
            description: String,
            created_at: DateTime<Utc>,
        }

        impl $crate::model::ResourceTyped for $ent {
            fn get_resource_type() -> $crate::model::ResourceType {
                $crate::model::ResourceType::$resource
            }
        }

        impl NamedLookup for $ent {
            fn id(&self) -> Uuid {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn description(&self) -> &str {
                &self.description
            }

            fn created_at(&self) -> &DateTime<Utc> {
                &self.created_at
            }
        }

        #[async_trait::async_trait]
        impl $crate::model::CrudRepository<$ent, LookupCreate, Uuid> for $ent {
            async fn create(
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
                data: LookupCreate,
            ) -> $crate::model::DatabaseResult<Self> {
                let row = sqlx::query_as(concat!(
                    "INSERT INTO ",
                    $table,
                    " (id, name, description) VALUES ($1, $2, $3) RETURNING *"
                ))
                .bind(Uuid::new_v4())
                .bind(data.name.trim())
                .bind(&data.description)
                .fetch_one(mm.executor())
                .await?;
                Ok(row)
            }

            async fn update(
                mut self,
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
                data: LookupCreate,
            ) -> $crate::model::DatabaseResult<Self> {
                sqlx::query(concat!(
                    "UPDATE ",
                    $table,
                    " SET name = $1, description = $2 WHERE id = $3"
                ))
                .bind(data.name.trim())
                .bind(&data.description)
                .bind(self.id)
                .execute(mm.executor())
                .await?;

                self.name = data.name.trim().to_string();
                self.description = data.description;
                Ok(self)
            }

            async fn delete(
                self,
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
            ) -> $crate::model::DatabaseResult<()> {
                sqlx::query(concat!("DELETE FROM ", $table, " WHERE id = $1"))
                    .bind(self.id)
                    .execute(mm.executor())
                    .await?;
                Ok(())
            }

            async fn find_by_id(
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
                id: Uuid,
            ) -> $crate::model::DatabaseResult<Option<Self>> {
                let row = sqlx::query_as(concat!("SELECT * FROM ", $table, " WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(mm.executor())
                    .await?;
                Ok(row)
            }

            async fn list(
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
                limit: i64,
                offset: i64,
            ) -> $crate::model::DatabaseResult<Vec<Self>> {
                let rows = sqlx::query_as(concat!(
                    "SELECT * FROM ",
                    $table,
                    " ORDER BY name LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(mm.executor())
                .await?;
                Ok(rows)
            }

            async fn count(
                mm: &$crate::model::ModelManager,
                _actor: &$crate::web::AuthenticatedUser,
            ) -> $crate::model::DatabaseResult<i64> {
                let result: i64 = sqlx::query_scalar(concat!("SELECT COUNT(*) FROM ", $table))
                    .fetch_one(mm.executor())
                    .await?;
                Ok(result)
            }
        }

        $crate::impl_paginatable_for!($ent, LookupCreate, Uuid);
    };
}

named_lookup!(Department, "departments", Department);
named_lookup!(EmployeeLevel, "employee_levels", EmployeeLevel);
named_lookup!(CourseCategory, "course_categories", CourseCategory);
named_lookup!(TypeDocument, "type_documents", TypeDocument);

impl Department {
    pub async fn find_by_name(
        mm: &crate::model::ModelManager,
        name: &str,
    ) -> crate::model::DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM departments WHERE name = $1")
            .bind(name)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }
}
