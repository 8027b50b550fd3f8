use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use super::{attach_roles, db_err, first_missing, role_model_to_domain, unique_or_db_err};
use crate::domain::{
    DomainError, DomainResult, NewRole, Permission, Role, RoleRepository, RoleUpdate, User,
};
use crate::infrastructure::database::entities::{role, user, user_role};
use crate::shared::{PageRequest, PaginatedResult};

pub struct SeaOrmRoleRepository {
    db: DatabaseConnection,
}

impl SeaOrmRoleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn change_users(&self, role_id: i64, user_ids: &[i64], grant: bool) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        role::Entity::find_by_id(role_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Role", "id", role_id))?;

        let found: BTreeSet<i64> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids.to_vec()))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| m.id)
            .collect();
        if let Some(missing) = first_missing(user_ids, &found) {
            return Err(DomainError::not_found("User", "id", missing));
        }

        if grant {
            let existing: BTreeSet<i64> = user_role::Entity::find()
                .filter(user_role::Column::RoleId.eq(role_id))
                .filter(user_role::Column::UserId.is_in(user_ids.to_vec()))
                .all(&txn)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(|l| l.user_id)
                .collect();
            let now = Utc::now();
            let rows: Vec<user_role::ActiveModel> = found
                .difference(&existing)
                .map(|user_id| user_role::ActiveModel {
                    user_id: Set(*user_id),
                    role_id: Set(role_id),
                    created_at: Set(now),
                })
                .collect();
            if !rows.is_empty() {
                user_role::Entity::insert_many(rows)
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
            }
        } else {
            user_role::Entity::delete_many()
                .filter(user_role::Column::RoleId.eq(role_id))
                .filter(user_role::Column::UserId.is_in(user_ids.to_vec()))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl RoleRepository for SeaOrmRoleRepository {
    async fn get_by_id(&self, id: i64) -> DomainResult<Role> {
        role::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(role_model_to_domain)
            .ok_or_else(|| DomainError::not_found("Role", "id", id))
    }

    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = role::Entity::find()
            .filter(role::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(role::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(role_model_to_domain).collect())
    }

    async fn save(&self, new: NewRole) -> DomainResult<Role> {
        let now = Utc::now();
        let name = new.name.clone();
        let model = role::ActiveModel {
            name: Set(new.name),
            description: Set(new.description),
            permission: Set(new.permission.bits() as i64),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| unique_or_db_err(e, || DomainError::Conflict(format!("role name {}", name))))?;

        Ok(role_model_to_domain(model))
    }

    async fn update(&self, id: i64, update: &RoleUpdate) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let existing = role::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Role", "id", id))?;

        let mut active: role::ActiveModel = existing.into();
        if let Some(v) = &update.name {
            active.name = Set(v.clone());
        }
        if let Some(v) = &update.description {
            active.description = Set(v.clone());
        }
        if let Some(v) = update.permission {
            active.permission = Set(v.bits() as i64);
        }
        active.updated_at = Set(Utc::now());

        let name = update.name.clone().unwrap_or_default();
        active
            .update(&txn)
            .await
            .map_err(|e| unique_or_db_err(e, || DomainError::Conflict(format!("role name {}", name))))?;
        txn.commit().await.map_err(db_err)
    }

    async fn set_permission_if(
        &self,
        id: i64,
        expected: Permission,
        permission: Permission,
    ) -> DomainResult<bool> {
        let result = role::Entity::update_many()
            .set(role::ActiveModel {
                permission: Set(permission.bits() as i64),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(role::Column::Id.eq(id))
            .filter(role::Column::Permission.eq(expected.bits() as i64))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected > 0 {
            return Ok(true);
        }
        self.get_by_id(id).await?;
        Ok(false)
    }

    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<Role>> {
        let mut query = role::Entity::find();
        if let Some(search) = &page.search {
            query = query.filter(role::Column::Name.contains(search));
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let models = query
            .order_by_asc(role::Column::Id)
            .offset(page.offset())
            .limit(u64::from(page.page_size))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(PaginatedResult::new(
            models.into_iter().map(role_model_to_domain).collect(),
            total,
            page.page,
            page.page_size,
        ))
    }

    async fn get_role_users(&self, role_id: i64) -> DomainResult<Vec<User>> {
        self.get_by_id(role_id).await?;
        let user_ids: Vec<i64> = user_role::Entity::find()
            .filter(user_role::Column::RoleId.eq(role_id))
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|l| l.user_id)
            .collect();
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        attach_roles(&self.db, models).await.map_err(db_err)
    }

    async fn grant_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.change_users(role_id, user_ids, true).await
    }

    async fn revoke_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.change_users(role_id, user_ids, false).await
    }

    async fn delete(&self, role_id: i64, cascade: bool) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;
        role::Entity::find_by_id(role_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Role", "id", role_id))?;

        let members = user_role::Entity::find()
            .filter(user_role::Column::RoleId.eq(role_id))
            .count(&txn)
            .await
            .map_err(db_err)?;
        if members > 0 {
            if !cascade {
                return Err(DomainError::RoleHasUsers(role_id));
            }
            user_role::Entity::delete_many()
                .filter(user_role::Column::RoleId.eq(role_id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            info!(role_id, members, "Removed role memberships before delete");
        }

        role::Entity::delete_by_id(role_id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)
    }
}
