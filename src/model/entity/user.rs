use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::ResourceTyped;
use crate::web::AuthenticatedUser;
use crate::web::UserRole;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserEntity {
    id: uuid::Uuid,
    username: String,
    full_name: String,
    email: String,
    #[serde(skip)]
    password_hash: String,
    role: String,
    department_id: Option<Uuid>,
    employee_level_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UserEntityCreateUpdate {
    pub username: String,
    pub full_name: String,
    pub email: String,
    /// Empty on update keeps the stored hash.
    pub password_hash: String,
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub employee_level_id: Option<Uuid>,
    pub is_active: bool,
}

impl ResourceTyped for UserEntity {
    fn get_resource_type() -> crate::model::repo::ResourceType {
        crate::model::repo::ResourceType::User
    }
}

impl UserEntity {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub fn department_id(&self) -> Option<Uuid> {
        self.department_id
    }

    pub fn employee_level_id(&self) -> Option<Uuid> {
        self.employee_level_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Update payload carrying the current values, to be patched by the caller.
    pub fn to_update(&self) -> UserEntityCreateUpdate {
        UserEntityCreateUpdate {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            password_hash: String::new(),
            role: self.role(),
            department_id: self.department_id,
            employee_level_id: self.employee_level_id,
            is_active: self.is_active,
        }
    }
}

#[async_trait::async_trait]
impl CrudRepository<UserEntity, UserEntityCreateUpdate, uuid::Uuid> for UserEntity {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO users
                (id, username, full_name, email, password_hash, role, department_id, employee_level_id, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.username)
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(data.role.to_string())
        .bind(data.department_id)
        .bind(data.employee_level_id)
        .bind(data.is_active)
        .fetch_one(mm.executor())
        .await?;

        Ok(row)
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        if !data.password_hash.is_empty() {
            self.password_hash = data.password_hash;
        }

        sqlx::query(
            r#"
            UPDATE users
            SET username = $1, full_name = $2, email = $3, password_hash = $4, role = $5,
                department_id = $6, employee_level_id = $7, is_active = $8
            WHERE id = $9
            "#,
        )
        .bind(&data.username)
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&self.password_hash)
        .bind(data.role.to_string())
        .bind(data.department_id)
        .bind(data.employee_level_id)
        .bind(data.is_active)
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.username = data.username;
        self.full_name = data.full_name;
        self.email = data.email;
        self.role = data.role.to_string();
        self.department_id = data.department_id;
        self.employee_level_id = data.employee_level_id;
        self.is_active = data.is_active;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM users ORDER BY username LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(UserEntity, UserEntityCreateUpdate, Uuid);

#[async_trait]
impl HasOwner for UserEntity {
    type OwnerId = uuid::Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.id) // owners of users are themselves
    }
}

/// Filters of the staff user listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserFilter {
    pub department_id: Option<Uuid>,
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

impl UserEntity {
    pub async fn find_by_username(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        username: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn search(
        mm: &ModelManager,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<crate::model::Page<Self>> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let role = filter.role.map(|r| r.to_string());

        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR department_id = $1)
              AND ($2::text IS NULL OR role = $2)
              AND ($3::text IS NULL OR username ILIKE $3 OR full_name ILIKE $3 OR email ILIKE $3)
        "#;

        let items = sqlx::query_as(&format!(
            "SELECT * FROM users {where_clause} ORDER BY username LIMIT $4 OFFSET $5"
        ))
        .bind(filter.department_id)
        .bind(&role)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {where_clause}"))
            .bind(filter.department_id)
            .bind(&role)
            .bind(&pattern)
            .fetch_one(mm.executor())
            .await?;

        Ok(crate::model::Page::new(items, total, limit, offset))
    }

    pub async fn count_by_role(mm: &ModelManager, role: UserRole) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.to_string())
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}
