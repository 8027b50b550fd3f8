//! First-start admin account

use tracing::{info, warn};

use crate::domain::{NewUser, PermissionRegistry, User, UserRepository};
use crate::infrastructure::crypto::hash_password;
use crate::shared::DomainResult;

#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Create `admin` holding every registered permission node when the user
/// table is empty. Returns `None` if accounts already exist.
pub async fn ensure_admin(
    users: &dyn UserRepository,
    registry: &PermissionRegistry,
    admin: &AdminAccount,
    bcrypt_cost: u32,
) -> DomainResult<Option<User>> {
    if users.count().await? > 0 {
        return Ok(None);
    }

    info!(cid = admin.cid, username = %admin.username, "Creating default admin user");
    let user = users
        .save(NewUser {
            cid: admin.cid,
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password, bcrypt_cost)?,
            permission: registry.all(),
        })
        .await?;
    warn!(user_id = user.id, "Default admin created, change its password");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{Fixture, TEST_COST};
    use crate::domain::Permission;
    use crate::infrastructure::crypto::verify_password;

    fn account() -> AdminAccount {
        AdminAccount {
            cid: 1,
            username: "admin".into(),
            email: "admin@localhost".into(),
            password: "admin123".into(),
        }
    }

    #[tokio::test]
    async fn creates_admin_once() {
        let fx = Fixture::new();
        let admin = ensure_admin(fx.users().as_ref(), &fx.registry, &account(), TEST_COST)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.permission, fx.registry.all());
        assert!(admin.permission.has(Permission::ROLE_EDIT_PERMISSION));
        assert!(verify_password("admin123", &admin.password_hash));

        let again = ensure_admin(fx.users().as_ref(), &fx.registry, &account(), TEST_COST)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn skipped_when_users_exist() {
        let fx = Fixture::new();
        fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        let created = ensure_admin(fx.users().as_ref(), &fx.registry, &account(), TEST_COST)
            .await
            .unwrap();
        assert!(created.is_none());
    }
}
