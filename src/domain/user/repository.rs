use async_trait::async_trait;

use super::model::{NewUser, User, UserGuard, UserUpdate};
use crate::shared::{DomainResult, PageRequest, PaginatedResult};

/// Read/write access to user accounts. Every returned `User` carries its
/// role memberships so effective permission can be derived.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> DomainResult<User>;
    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>>;
    /// Matches either the numeric id or the call-sign.
    async fn get_by_id_or_cid(&self, value: i64) -> DomainResult<User>;
    async fn get_by_username_or_email(&self, value: &str) -> DomainResult<User>;

    /// True when no user holds any of the supplied identity fields.
    async fn is_identity_available(
        &self,
        cid: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DomainResult<bool>;
    async fn count(&self) -> DomainResult<u64>;

    /// Unique violations surface as `IdentityTaken`.
    async fn save(&self, user: NewUser) -> DomainResult<User>;
    async fn update(&self, id: i64, update: &UserUpdate) -> DomainResult<()>;
    /// Write `update` only if the stored row still satisfies `guard`, as a
    /// single conditional statement. `Ok(false)` means the row changed
    /// since it was read.
    async fn update_if(&self, id: i64, update: &UserUpdate, guard: &UserGuard) -> DomainResult<bool>;
    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<User>>;

    /// Attach roles in one transaction. The user and every role must exist;
    /// memberships that already exist are left alone.
    async fn grant_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()>;
    async fn revoke_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()>;
}
