use async_trait::async_trait;

use super::model::{NewRole, Role, RoleUpdate};
use crate::domain::permission::Permission;
use crate::domain::user::User;
use crate::shared::{DomainResult, PageRequest, PaginatedResult};

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> DomainResult<Role>;
    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<Role>>;
    /// Duplicate names surface as `Conflict`.
    async fn save(&self, role: NewRole) -> DomainResult<Role>;
    async fn update(&self, id: i64, update: &RoleUpdate) -> DomainResult<()>;
    /// Replace the mask only while it still equals `expected`. `Ok(false)`
    /// means another writer got there first.
    async fn set_permission_if(
        &self,
        id: i64,
        expected: Permission,
        permission: Permission,
    ) -> DomainResult<bool>;
    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<Role>>;
    async fn get_role_users(&self, role_id: i64) -> DomainResult<Vec<User>>;

    /// Attach users in one transaction. The role and every user must exist;
    /// memberships that already exist are left alone.
    async fn grant_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()>;
    async fn revoke_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()>;

    /// Delete a role. With members present this fails with `RoleHasUsers`
    /// unless `cascade` is set, in which case the memberships go first in
    /// the same transaction.
    async fn delete(&self, role_id: i64, cascade: bool) -> DomainResult<()>;
}
