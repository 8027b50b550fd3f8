//! Shared fixtures for service tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use crate::application::context::{Actor, ClientMeta};
use crate::application::side_effects::SideEffects;
use crate::domain::{
    NewRole, NewUser, Permission, PermissionRegistry, Role, RoleRepository, User, UserGuard,
    UserRepository, UserUpdate,
};
use crate::infrastructure::clients::{AuditBus, AuditSubscriber, InMemoryEmailCodeStore, TracingMailer};
use crate::infrastructure::crypto::{hash_password, JwtClaimFactory, JwtConfig};
use crate::infrastructure::storage::InMemoryAccountStore;
use crate::shared::{DomainResult, PageRequest, PaginatedResult};

pub const TEST_COST: u32 = 4;

pub struct Fixture {
    pub store: Arc<InMemoryAccountStore>,
    pub bus: AuditBus,
    pub audit: AuditSubscriber,
    pub mailer: Arc<TracingMailer>,
    pub codes: Arc<InMemoryEmailCodeStore>,
    pub tokens: Arc<JwtClaimFactory>,
    pub registry: Arc<PermissionRegistry>,
    pub side_effects: SideEffects,
}

impl Fixture {
    pub fn new() -> Self {
        let bus = AuditBus::new();
        let audit = bus.subscribe();
        let mailer = Arc::new(TracingMailer::new(64));
        let codes = Arc::new(InMemoryEmailCodeStore::new(Duration::minutes(5)));
        let side_effects = SideEffects::new(Arc::new(bus.clone()), mailer.clone(), codes.clone());
        Self {
            store: Arc::new(InMemoryAccountStore::new()),
            bus,
            audit,
            mailer,
            codes,
            tokens: Arc::new(JwtClaimFactory::new(JwtConfig::default())),
            registry: Arc::new(PermissionRegistry::builtin()),
            side_effects,
        }
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.store.clone()
    }

    pub fn roles(&self) -> Arc<dyn RoleRepository> {
        self.store.clone()
    }

    pub async fn user(&self, cid: i64, username: &str, password: &str, permission: Permission) -> User {
        UserRepository::save(
            self.store.as_ref(),
            NewUser {
                cid,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(password, TEST_COST).unwrap(),
                permission,
            },
        )
        .await
        .unwrap()
    }

    pub async fn role(&self, name: &str, permission: Permission) -> Role {
        RoleRepository::save(
            self.store.as_ref(),
            NewRole {
                name: name.to_string(),
                description: format!("{name} role"),
                permission,
            },
        )
        .await
        .unwrap()
    }

    pub async fn reload(&self, id: i64) -> User {
        UserRepository::get_by_id(self.store.as_ref(), id).await.unwrap()
    }

    /// Wait for detached side effects and return the audit events they emitted.
    pub async fn settle(&mut self) -> Vec<crate::domain::AuditEvent> {
        self.side_effects.wait_idle().await;
        self.audit.drain()
    }
}

pub fn actor_for(user: &User) -> Actor {
    Actor::new(
        user.id,
        user.cid,
        user.effective_permission(),
        ClientMeta::new("127.0.0.1", "tests"),
    )
}

/// User repository that applies one foreign write right after the first
/// single-user read, as if another request landed between read and write.
pub struct Interleaved {
    inner: Arc<dyn UserRepository>,
    pending: Mutex<Option<UserUpdate>>,
    stale_availability: bool,
}

impl Interleaved {
    pub fn new(inner: Arc<dyn UserRepository>, update: UserUpdate) -> Self {
        Self {
            inner,
            pending: Mutex::new(Some(update)),
            stale_availability: false,
        }
    }

    /// Report every identity as free, as a check that ran before a
    /// competing insert committed would.
    pub fn with_stale_availability(inner: Arc<dyn UserRepository>) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
            stale_availability: true,
        }
    }

    async fn interleave(&self, user: User) -> DomainResult<User> {
        let pending = self.pending.lock().unwrap().take();
        if let Some(update) = pending {
            self.inner.update(user.id, &update).await?;
        }
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for Interleaved {
    async fn get_by_id(&self, id: i64) -> DomainResult<User> {
        let user = self.inner.get_by_id(id).await?;
        self.interleave(user).await
    }

    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>> {
        self.inner.get_by_ids(ids).await
    }

    async fn get_by_id_or_cid(&self, value: i64) -> DomainResult<User> {
        let user = self.inner.get_by_id_or_cid(value).await?;
        self.interleave(user).await
    }

    async fn get_by_username_or_email(&self, value: &str) -> DomainResult<User> {
        let user = self.inner.get_by_username_or_email(value).await?;
        self.interleave(user).await
    }

    async fn is_identity_available(
        &self,
        cid: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DomainResult<bool> {
        if self.stale_availability {
            return Ok(true);
        }
        self.inner.is_identity_available(cid, username, email).await
    }

    async fn count(&self) -> DomainResult<u64> {
        self.inner.count().await
    }

    async fn save(&self, user: NewUser) -> DomainResult<User> {
        self.inner.save(user).await
    }

    async fn update(&self, id: i64, update: &UserUpdate) -> DomainResult<()> {
        self.inner.update(id, update).await
    }

    async fn update_if(&self, id: i64, update: &UserUpdate, guard: &UserGuard) -> DomainResult<bool> {
        self.inner.update_if(id, update, guard).await
    }

    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<User>> {
        self.inner.get_pages(page).await
    }

    async fn grant_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.inner.grant_roles(user_id, role_ids).await
    }

    async fn revoke_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.inner.revoke_roles(user_id, role_ids).await
    }
}
