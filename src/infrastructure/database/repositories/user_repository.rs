use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{attach_roles, db_err, first_missing, unique_or_db_err};
use crate::domain::{
    DomainError, DomainResult, NewUser, User, UserGuard, UserRepository, UserUpdate,
};
use crate::infrastructure::database::entities::{role, user, user_role};
use crate::shared::{PageRequest, PaginatedResult};

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn one(&self, condition: Condition, field: &'static str, value: String) -> DomainResult<User> {
        let model = user::Entity::find()
            .filter(condition)
            .order_by_asc(user::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("User", field, value))?;
        let mut users = attach_roles(&self.db, vec![model]).await.map_err(db_err)?;
        users
            .pop()
            .ok_or_else(|| DomainError::Internal("user vanished while loading roles".into()))
    }

    /// Validate the user and roles, then insert or delete the membership
    /// rows, all inside one transaction.
    async fn change_roles(&self, user_id: i64, role_ids: &[i64], grant: bool) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        user::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("User", "id", user_id))?;

        let found: BTreeSet<i64> = role::Entity::find()
            .filter(role::Column::Id.is_in(role_ids.to_vec()))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| m.id)
            .collect();
        if let Some(missing) = first_missing(role_ids, &found) {
            return Err(DomainError::not_found("Role", "id", missing));
        }

        if grant {
            let existing: BTreeSet<i64> = user_role::Entity::find()
                .filter(user_role::Column::UserId.eq(user_id))
                .filter(user_role::Column::RoleId.is_in(role_ids.to_vec()))
                .all(&txn)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(|l| l.role_id)
                .collect();
            let now = Utc::now();
            let rows: Vec<user_role::ActiveModel> = found
                .difference(&existing)
                .map(|role_id| user_role::ActiveModel {
                    user_id: Set(user_id),
                    role_id: Set(*role_id),
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
                .filter(user_role::Column::UserId.eq(user_id))
                .filter(user_role::Column::RoleId.is_in(role_ids.to_vec()))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }
}

/// Copy the `Some` fields of `update` onto `active` and stamp `updated_at`.
fn set_fields(active: &mut user::ActiveModel, update: &UserUpdate) {
    if let Some(v) = &update.username {
        active.username = Set(v.clone());
    }
    if let Some(v) = &update.email {
        active.email = Set(v.clone());
    }
    if let Some(v) = &update.qq {
        active.qq = Set(v.clone());
    }
    if let Some(v) = &update.password_hash {
        active.password = Set(v.clone());
    }
    if let Some(v) = update.permission {
        active.permission = Set(v.bits() as i64);
    }
    if let Some(v) = update.banned {
        active.banned = Set(v);
    }
    if let Some(v) = update.banned_until {
        active.banned_until = Set(v);
    }
    if let Some(v) = update.last_login_time {
        active.last_login_time = Set(Some(v));
    }
    if let Some(v) = &update.last_login_ip {
        active.last_login_ip = Set(Some(v.clone()));
    }
    active.updated_at = Set(Utc::now());
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn get_by_id(&self, id: i64) -> DomainResult<User> {
        self.one(Condition::all().add(user::Column::Id.eq(id)), "id", id.to_string())
            .await
    }

    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        attach_roles(&self.db, models).await.map_err(db_err)
    }

    async fn get_by_id_or_cid(&self, value: i64) -> DomainResult<User> {
        let condition = Condition::any()
            .add(user::Column::Id.eq(value))
            .add(user::Column::Cid.eq(value));
        self.one(condition, "id_or_cid", value.to_string()).await
    }

    async fn get_by_username_or_email(&self, value: &str) -> DomainResult<User> {
        let condition = Condition::any()
            .add(user::Column::Username.eq(value))
            .add(user::Column::Email.eq(value));
        self.one(condition, "username_or_email", value.to_string())
            .await
    }

    async fn is_identity_available(
        &self,
        cid: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DomainResult<bool> {
        let mut condition = Condition::any();
        if let Some(cid) = cid {
            condition = condition.add(user::Column::Cid.eq(cid));
        }
        if let Some(username) = username {
            condition = condition.add(user::Column::Username.eq(username));
        }
        if let Some(email) = email {
            condition = condition.add(user::Column::Email.eq(email));
        }
        if condition.is_empty() {
            return Ok(true);
        }
        let taken = user::Entity::find()
            .filter(condition)
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(taken == 0)
    }

    async fn count(&self) -> DomainResult<u64> {
        user::Entity::find().count(&self.db).await.map_err(db_err)
    }

    async fn save(&self, new: NewUser) -> DomainResult<User> {
        let now = Utc::now();
        let model = user::ActiveModel {
            cid: Set(new.cid),
            username: Set(new.username),
            email: Set(new.email),
            password: Set(new.password_hash),
            qq: Set(None),
            permission: Set(new.permission.bits() as i64),
            banned: Set(false),
            banned_until: Set(None),
            last_login_time: Set(None),
            last_login_ip: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| unique_or_db_err(e, || DomainError::IdentityTaken))?;

        Ok(super::user_model_to_domain(model, Vec::new()))
    }

    async fn update(&self, id: i64, update: &UserUpdate) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let existing = user::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("User", "id", id))?;

        let mut active: user::ActiveModel = existing.into();
        set_fields(&mut active, update);

        active
            .update(&txn)
            .await
            .map_err(|e| unique_or_db_err(e, || DomainError::IdentityTaken))?;
        txn.commit().await.map_err(db_err)
    }

    async fn update_if(&self, id: i64, update: &UserUpdate, guard: &UserGuard) -> DomainResult<bool> {
        let mut active = <user::ActiveModel as Default>::default();
        set_fields(&mut active, update);

        let mut query = user::Entity::update_many()
            .set(active)
            .filter(user::Column::Id.eq(id));
        if let Some(permission) = guard.permission {
            query = query.filter(user::Column::Permission.eq(permission.bits() as i64));
        }
        if let Some(banned) = guard.banned {
            query = query.filter(user::Column::Banned.eq(banned));
        }
        query = match guard.banned_until {
            Some(Some(until)) => query.filter(user::Column::BannedUntil.eq(until)),
            Some(None) => query.filter(user::Column::BannedUntil.is_null()),
            None => query,
        };

        let result = query
            .exec(&self.db)
            .await
            .map_err(|e| unique_or_db_err(e, || DomainError::IdentityTaken))?;
        if result.rows_affected > 0 {
            return Ok(true);
        }
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("User", "id", id))?;
        Ok(false)
    }

    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<User>> {
        let mut query = user::Entity::find();

        if let Some(search) = &page.search {
            let mut condition = Condition::any()
                .add(user::Column::Username.contains(search))
                .add(user::Column::Email.contains(search));
            if let Ok(cid) = search.trim().parse::<i64>() {
                condition = condition.add(user::Column::Cid.eq(cid));
            }
            query = query.filter(condition);
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let models = query
            .order_by_asc(user::Column::Id)
            .offset(page.offset())
            .limit(u64::from(page.page_size))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        let items = attach_roles(&self.db, models).await.map_err(db_err)?;

        Ok(PaginatedResult::new(items, total, page.page, page.page_size))
    }

    async fn grant_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.change_roles(user_id, role_ids, true).await
    }

    async fn revoke_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.change_roles(user_id, role_ids, false).await
    }
}
