//! Request context, e.g. user id, its role, etc.
//!

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::{
    model::ResourceType,
    web::{WebResult, error::WebError},
};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user_id: uuid::Uuid,
    user_role: UserRole,
}

impl AuthenticatedUser {
    pub fn new(user_id: uuid::Uuid, user_role: UserRole) -> Self {
        Self { user_id, user_role }
    }

    /// Internal actor used for lookups that must bypass ownership checks.
    pub fn admin() -> Self {
        Self {
            user_role: UserRole::Admin,
            user_id: uuid::Uuid::max(), // system admin ID
        }
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.user_id
    }

    pub fn user_role(&self) -> UserRole {
        self.user_role
    }

    pub fn is_staff(&self) -> bool {
        self.user_role.is_staff()
    }

    /// `true` for the internal actor, which has no row in `users`.
    pub fn is_system(&self) -> bool {
        self.user_id == uuid::Uuid::max()
    }

    /// User id suitable for a foreign key column.
    pub fn user_ref(&self) -> Option<uuid::Uuid> {
        (!self.is_system()).then_some(self.user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Hr,
    Student,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Hr)
    }
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "hr" => Self::Hr,
            _ => Self::Student,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Hr => write!(f, "hr"),
            Self::Student => write!(f, "student"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    maybe_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn new(maybe_user: Option<AuthenticatedUser>) -> Self {
        Self { maybe_user }
    }

    pub fn admin() -> Self {
        Self::new(Some(AuthenticatedUser::admin()))
    }

    pub fn maybe_user(&self) -> Option<&AuthenticatedUser> {
        self.maybe_user.as_ref()
    }

    pub fn user(&self) -> WebResult<&AuthenticatedUser> {
        self.maybe_user.as_ref().ok_or(WebError::auth_required())
    }

    /// Admin or HR, otherwise the resource is forbidden.
    pub fn staff(&self, r#type: ResourceType) -> WebResult<&AuthenticatedUser> {
        let user = self.user()?;
        if !user.is_staff() {
            return Err(WebError::resource_forbidden(r#type));
        }
        Ok(user)
    }

    pub fn admin_only(&self, r#type: ResourceType) -> WebResult<&AuthenticatedUser> {
        let user = self.user()?;
        if user.user_role() != UserRole::Admin {
            return Err(WebError::resource_forbidden(r#type));
        }
        Ok(user)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>();
        if let Some(ctx) = ctx {
            Ok(ctx.clone())
        } else {
            Ok(RequestContext::new(None))
        }
    }
}
