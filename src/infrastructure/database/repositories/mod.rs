//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories sharing the row conversion and
//! membership loading helpers below.

pub mod role_repository;
pub mod user_repository;

pub use role_repository::SeaOrmRoleRepository;
pub use user_repository::SeaOrmUserRepository;

use std::collections::{BTreeSet, HashMap};

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, SqlErr};
use tracing::error;

use crate::domain::{DomainError, Permission, Role, User};
use crate::infrastructure::database::entities::{role, user, user_role};
use crate::shared::InfraError;

pub(crate) fn db_err(e: DbErr) -> DomainError {
    error!(error = %e, "Database error");
    InfraError::from(e).into()
}

/// Map a unique-constraint violation to `conflict`, anything else to a
/// database error.
pub(crate) fn unique_or_db_err(e: DbErr, conflict: impl FnOnce() -> DomainError) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => conflict(),
        _ => db_err(e),
    }
}

pub(crate) fn role_model_to_domain(model: role::Model) -> Role {
    Role {
        id: model.id,
        name: model.name,
        description: model.description,
        permission: Permission::from_bits(model.permission as u64),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub(crate) fn user_model_to_domain(model: user::Model, roles: Vec<Role>) -> User {
    User {
        id: model.id,
        cid: model.cid,
        username: model.username,
        email: model.email,
        password_hash: model.password,
        qq: model.qq,
        permission: Permission::from_bits(model.permission as u64),
        banned: model.banned,
        banned_until: model.banned_until,
        last_login_time: model.last_login_time,
        last_login_ip: model.last_login_ip,
        roles,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Load the roles of every user in `models` with two queries.
pub(crate) async fn attach_roles<C: ConnectionTrait>(
    conn: &C,
    models: Vec<user::Model>,
) -> Result<Vec<User>, DbErr> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let user_ids: Vec<i64> = models.iter().map(|m| m.id).collect();
    let links = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(user_ids))
        .all(conn)
        .await?;

    let role_ids: BTreeSet<i64> = links.iter().map(|l| l.role_id).collect();
    let roles: HashMap<i64, Role> = if role_ids.is_empty() {
        HashMap::new()
    } else {
        role::Entity::find()
            .filter(role::Column::Id.is_in(role_ids))
            .order_by_asc(role::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|m| (m.id, role_model_to_domain(m)))
            .collect()
    };

    let mut by_user: HashMap<i64, Vec<Role>> = HashMap::new();
    for link in links {
        if let Some(role) = roles.get(&link.role_id) {
            by_user.entry(link.user_id).or_default().push(role.clone());
        }
    }

    Ok(models
        .into_iter()
        .map(|m| {
            let mut roles = by_user.remove(&m.id).unwrap_or_default();
            roles.sort_by_key(|r| r.id);
            user_model_to_domain(m, roles)
        })
        .collect())
}

/// First id in `wanted` that is not in `found`.
pub(crate) fn first_missing(wanted: &[i64], found: &BTreeSet<i64>) -> Option<i64> {
    wanted.iter().copied().find(|id| !found.contains(id))
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;

    use crate::infrastructure::database::migrator::Migrator;

    /// Fresh migrated SQLite database held on a single connection.
    pub async fn memory_db() -> DatabaseConnection {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }
}
