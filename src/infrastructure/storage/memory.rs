//! In-memory account store
//!
//! Implements both repository ports over a single lock, so every write is
//! serialized the same way a database transaction would serialize it.
//! Backs the service and router tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    NewRole, NewUser, Permission, Role, RoleRepository, RoleUpdate, User, UserGuard,
    UserRepository, UserUpdate,
};
use crate::shared::{DomainError, DomainResult, PageRequest, PaginatedResult};

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    /// (user_id, role_id)
    memberships: BTreeSet<(i64, i64)>,
    next_user_id: i64,
    next_role_id: i64,
}

impl State {
    fn with_roles(&self, user: &User) -> User {
        let mut user = user.clone();
        user.roles = self
            .memberships
            .iter()
            .filter(|(uid, _)| *uid == user.id)
            .filter_map(|(_, rid)| self.roles.get(rid).cloned())
            .collect();
        user
    }

    fn user(&self, id: i64) -> DomainResult<User> {
        self.users
            .get(&id)
            .map(|u| self.with_roles(u))
            .ok_or_else(|| DomainError::not_found("User", "id", id))
    }

    fn role(&self, id: i64) -> DomainResult<&Role> {
        self.roles
            .get(&id)
            .ok_or_else(|| DomainError::not_found("Role", "id", id))
    }

    fn identity_taken(&self, skip: Option<i64>, cid: Option<i64>, username: Option<&str>, email: Option<&str>) -> bool {
        self.users.values().filter(|u| Some(u.id) != skip).any(|u| {
            cid == Some(u.cid) || username == Some(u.username.as_str()) || email == Some(u.email.as_str())
        })
    }

    fn members_of(&self, role_id: i64) -> Vec<i64> {
        self.memberships
            .iter()
            .filter(|(_, rid)| *rid == role_id)
            .map(|(uid, _)| *uid)
            .collect()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: &PageRequest) -> PaginatedResult<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.page_size as usize)
        .collect();
    PaginatedResult::new(items, total, page.page, page.page_size)
}

pub struct InMemoryAccountStore {
    state: RwLock<State>,
    fail_writes: AtomicBool,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_user_id: 1,
                next_role_id: 1,
                ..State::default()
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(DomainError::Database("store is read-only".into()))
        } else {
            Ok(())
        }
    }

    pub async fn membership_count(&self) -> usize {
        self.state.read().await.memberships.len()
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryAccountStore {
    async fn get_by_id(&self, id: i64) -> DomainResult<User> {
        self.state.read().await.user(id)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<User>> {
        let state = self.state.read().await;
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| state.users.get(&id).map(|u| state.with_roles(u)))
            .collect())
    }

    async fn get_by_id_or_cid(&self, value: i64) -> DomainResult<User> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|u| u.id == value || u.cid == value)
            .map(|u| state.with_roles(u))
            .ok_or_else(|| DomainError::not_found("User", "id_or_cid", value))
    }

    async fn get_by_username_or_email(&self, value: &str) -> DomainResult<User> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|u| u.username == value || u.email == value)
            .map(|u| state.with_roles(u))
            .ok_or_else(|| DomainError::not_found("User", "username_or_email", value))
    }

    async fn is_identity_available(
        &self,
        cid: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DomainResult<bool> {
        Ok(!self.state.read().await.identity_taken(None, cid, username, email))
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn save(&self, new: NewUser) -> DomainResult<User> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.identity_taken(None, Some(new.cid), Some(&new.username), Some(&new.email)) {
            return Err(DomainError::IdentityTaken);
        }
        let now = Utc::now();
        let id = state.next_user_id;
        state.next_user_id += 1;
        let user = User {
            id,
            cid: new.cid,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            qq: None,
            permission: new.permission,
            banned: false,
            banned_until: None,
            last_login_time: None,
            last_login_ip: None,
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, update: &UserUpdate) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(DomainError::not_found("User", "id", id));
        }
        if state.identity_taken(Some(id), None, update.username.as_deref(), update.email.as_deref()) {
            return Err(DomainError::IdentityTaken);
        }
        if let Some(user) = state.users.get_mut(&id) {
            update.apply_to(user);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_if(&self, id: i64, update: &UserUpdate, guard: &UserGuard) -> DomainResult<bool> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if !guard.matches(&state.user(id)?) {
            return Ok(false);
        }
        if state.identity_taken(Some(id), None, update.username.as_deref(), update.email.as_deref()) {
            return Err(DomainError::IdentityTaken);
        }
        if let Some(user) = state.users.get_mut(&id) {
            update.apply_to(user);
            user.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<User>> {
        let state = self.state.read().await;
        let matches: Vec<User> = state
            .users
            .values()
            .filter(|u| match &page.search {
                Some(s) => {
                    u.username.contains(s.as_str())
                        || u.email.contains(s.as_str())
                        || u.cid.to_string().contains(s.as_str())
                }
                None => true,
            })
            .map(|u| state.with_roles(u))
            .collect();
        Ok(paginate(matches, page))
    }

    async fn grant_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.user(user_id)?;
        for role_id in role_ids {
            state.role(*role_id)?;
        }
        for role_id in role_ids {
            state.memberships.insert((user_id, *role_id));
        }
        Ok(())
    }

    async fn revoke_roles(&self, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.user(user_id)?;
        for role_id in role_ids {
            state.role(*role_id)?;
        }
        for role_id in role_ids {
            state.memberships.remove(&(user_id, *role_id));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccountStore {
    async fn get_by_id(&self, id: i64) -> DomainResult<Role> {
        self.state.read().await.role(id).cloned()
    }

    async fn get_by_ids(&self, ids: &[i64]) -> DomainResult<Vec<Role>> {
        let state = self.state.read().await;
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| state.roles.get(&id).cloned())
            .collect())
    }

    async fn save(&self, new: NewRole) -> DomainResult<Role> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.roles.values().any(|r| r.name == new.name) {
            return Err(DomainError::Conflict(format!("role name {}", new.name)));
        }
        let now = Utc::now();
        let id = state.next_role_id;
        state.next_role_id += 1;
        let role = Role {
            id,
            name: new.name,
            description: new.description,
            permission: new.permission,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update(&self, id: i64, update: &RoleUpdate) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.role(id)?;
        if let Some(name) = &update.name {
            if state.roles.values().any(|r| r.id != id && &r.name == name) {
                return Err(DomainError::Conflict(format!("role name {}", name)));
            }
        }
        if let Some(role) = state.roles.get_mut(&id) {
            update.apply_to(role);
            role.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_permission_if(
        &self,
        id: i64,
        expected: Permission,
        permission: Permission,
    ) -> DomainResult<bool> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.role(id)?;
        match state.roles.get_mut(&id) {
            Some(role) if role.permission == expected => {
                role.permission = permission;
                role.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_pages(&self, page: &PageRequest) -> DomainResult<PaginatedResult<Role>> {
        let state = self.state.read().await;
        let matches: Vec<Role> = state
            .roles
            .values()
            .filter(|r| match &page.search {
                Some(s) => r.name.contains(s.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn get_role_users(&self, role_id: i64) -> DomainResult<Vec<User>> {
        let state = self.state.read().await;
        state.role(role_id)?;
        state
            .members_of(role_id)
            .into_iter()
            .map(|uid| state.user(uid))
            .collect()
    }

    async fn grant_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.role(role_id)?;
        for user_id in user_ids {
            state.user(*user_id)?;
        }
        for user_id in user_ids {
            state.memberships.insert((*user_id, role_id));
        }
        Ok(())
    }

    async fn revoke_users(&self, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.role(role_id)?;
        for user_id in user_ids {
            state.user(*user_id)?;
        }
        for user_id in user_ids {
            state.memberships.remove(&(*user_id, role_id));
        }
        Ok(())
    }

    async fn delete(&self, role_id: i64, cascade: bool) -> DomainResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.role(role_id)?;
        let members = state.members_of(role_id);
        if !members.is_empty() && !cascade {
            return Err(DomainError::RoleHasUsers(role_id));
        }
        state.memberships.retain(|(_, rid)| *rid != role_id);
        state.roles.remove(&role_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(cid: i64, name: &str) -> NewUser {
        NewUser {
            cid,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "x".into(),
            permission: Permission::NONE,
        }
    }

    fn new_role(name: &str, permission: Permission) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: String::new(),
            permission,
        }
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let store = InMemoryAccountStore::new();
        UserRepository::save(&store, new_user(1, "alpha")).await.unwrap();

        let err = UserRepository::save(&store, new_user(1, "bravo")).await.unwrap_err();
        assert!(matches!(err, DomainError::IdentityTaken));
        assert!(!store.is_identity_available(None, Some("alpha"), None).await.unwrap());
        assert!(store.is_identity_available(Some(2), Some("bravo"), None).await.unwrap());
    }

    #[tokio::test]
    async fn grant_is_all_or_nothing() {
        let store = InMemoryAccountStore::new();
        let user = UserRepository::save(&store, new_user(1, "alpha")).await.unwrap();
        let role = RoleRepository::save(&store, new_role("pilots", Permission::FSD_OBSERVER)).await.unwrap();

        let err = store.grant_roles(user.id, &[role.id, 99]).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Role", .. }));
        assert_eq!(store.membership_count().await, 0);

        store.grant_roles(user.id, &[role.id]).await.unwrap();
        store.grant_roles(user.id, &[role.id]).await.unwrap();
        assert_eq!(store.membership_count().await, 1);

        let loaded = UserRepository::get_by_id(&store, user.id).await.unwrap();
        assert_eq!(loaded.effective_permission(), Permission::FSD_OBSERVER);
    }

    #[tokio::test]
    async fn delete_role_respects_cascade_flag() {
        let store = InMemoryAccountStore::new();
        let user = UserRepository::save(&store, new_user(1, "alpha")).await.unwrap();
        let role = RoleRepository::save(&store, new_role("pilots", Permission::NONE)).await.unwrap();
        store.grant_users(role.id, &[user.id]).await.unwrap();

        let err = store.delete(role.id, false).await.unwrap_err();
        assert!(matches!(err, DomainError::RoleHasUsers(id) if id == role.id));

        store.delete(role.id, true).await.unwrap();
        assert_eq!(store.membership_count().await, 0);
        assert!(RoleRepository::get_by_id(&store, role.id).await.is_err());
    }

    #[tokio::test]
    async fn id_or_cid_lookup() {
        let store = InMemoryAccountStore::new();
        let user = UserRepository::save(&store, new_user(1234, "alpha")).await.unwrap();
        assert_eq!(store.get_by_id_or_cid(1234).await.unwrap().id, user.id);
        assert_eq!(store.get_by_id_or_cid(user.id).await.unwrap().cid, 1234);
        assert!(store.get_by_id_or_cid(77).await.is_err());
    }
}
