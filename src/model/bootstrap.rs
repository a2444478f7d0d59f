use crate::{
    auth::hash_password,
    config::Config,
    error::AppResult,
    model::{CrudRepository, ModelManager, entity::{UserEntity, UserEntityCreateUpdate}},
    web::{AuthenticatedUser, UserRole},
};

/// Creates the configured admin account when no admin exists yet.
/// Returns the created user, `None` if an admin was already present.
#[tracing::instrument(skip_all)]
pub async fn ensure_admin(mm: &ModelManager, config: &Config) -> AppResult<Option<UserEntity>> {
    if UserEntity::count_by_role(mm, UserRole::Admin).await? > 0 {
        tracing::debug!("admin account present, skipping bootstrap");
        return Ok(None);
    }

    let app = config.app();
    let actor = AuthenticatedUser::admin();
    if let Some(existing) = UserEntity::find_by_username(mm, &actor, app.admin_username()).await? {
        tracing::warn!(
            "user {} exists without admin role, leaving it untouched",
            existing.username()
        );
        return Ok(None);
    }

    let data = UserEntityCreateUpdate {
        username: app.admin_username().to_string(),
        full_name: String::from("Administrator"),
        email: String::new(),
        password_hash: hash_password(app.admin_password())?,
        role: UserRole::Admin,
        department_id: None,
        employee_level_id: None,
        is_active: true,
    };
    let user = UserEntity::create(mm, &actor, data).await?;
    tracing::info!("created admin account {}", user.username());
    Ok(Some(user))
}
