use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::web::UserRole;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SigninBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PasswordChangeBody {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UserCreateBody {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
    pub department_id: Option<Uuid>,
    pub employee_level_id: Option<Uuid>,
}

fn default_role() -> UserRole {
    UserRole::Student
}

/// Present fields become `Some`, so an explicit `null` reads as `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update; absent fields keep their value. `department_id` and
/// `employee_level_id` are cleared by an explicit `null`.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UserUpdateBody {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub employee_level_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

impl UserUpdateBody {
    /// Fields only staff may change.
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some()
            || self.department_id.is_some()
            || self.employee_level_id.is_some()
            || self.is_active.is_some()
    }
}

pub const MIN_PASSWORD_LEN: usize = 4;

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("password must have at least {MIN_PASSWORD_LEN} characters"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let trimmed = username.trim();
    if trimmed.is_empty() || trimmed.len() != username.len() {
        return Err("username must be non-empty without surrounding spaces".into());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn student_update_is_not_privileged() {
        let body = UserUpdateBody {
            full_name: Some("Jane".into()),
            ..Default::default()
        };
        assert!(!body.touches_privileged_fields());

        let body = UserUpdateBody {
            role: Some(UserRole::Admin),
            ..Default::default()
        };
        assert!(body.touches_privileged_fields());
    }

    #[test]
    fn null_clears_while_absent_keeps() {
        let body: UserUpdateBody = serde_json::from_str(r#"{"department_id": null}"#).unwrap();
        assert_eq!(body.department_id, Some(None));
        assert_eq!(body.employee_level_id, None);
        assert!(body.touches_privileged_fields());

        let id = Uuid::new_v4();
        let body: UserUpdateBody =
            serde_json::from_str(&format!(r#"{{"employee_level_id": "{id}"}}"#)).unwrap();
        assert_eq!(body.employee_level_id, Some(Some(id)));

        let body: UserUpdateBody = serde_json::from_str(r#"{"full_name": "Jane"}"#).unwrap();
        assert!(!body.touches_privileged_fields());
    }

    #[test]
    fn credential_rules() {
        assert!(validate_password("abc").is_err());
        assert!(validate_password("abcd").is_ok());
        assert!(validate_username(" bob").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("bob").is_ok());
    }
}
