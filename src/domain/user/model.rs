use chrono::{DateTime, Utc};

use crate::domain::permission::Permission;
use crate::domain::role::Role;

/// Ban state derived from the stored `banned` / `banned_until` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    /// `until == None` is a permanent ban
    Banned { until: Option<DateTime<Utc>> },
}

/// User model
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub qq: Option<String>,
    pub permission: Permission,
    pub banned: bool,
    pub banned_until: Option<DateTime<Utc>>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Own mask merged with every role mask.
    pub fn effective_permission(&self) -> Permission {
        self.roles
            .iter()
            .fold(self.permission, |acc, role| acc.merge(role.permission))
    }

    pub fn account_state(&self) -> AccountState {
        if self.banned {
            AccountState::Banned {
                until: self.banned_until,
            }
        } else {
            AccountState::Active
        }
    }

    /// Clear a timed ban whose end is at or before `now`. Returns whether
    /// anything changed; the caller persists the change.
    pub fn lift_expired_ban(&mut self, now: DateTime<Utc>) -> bool {
        match self.account_state() {
            AccountState::Banned { until: Some(until) } if until <= now => {
                self.banned = false;
                self.banned_until = None;
                true
            }
            _ => false,
        }
    }

    /// Call-sign as shown to people, zero padded to four digits.
    pub fn display_cid(&self) -> String {
        format_cid(self.cid)
    }

    pub fn role_ids(&self) -> Vec<i64> {
        self.roles.iter().map(|r| r.id).collect()
    }
}

/// Longest timed ban, ten years.
pub const MAX_BAN_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

pub fn format_cid(cid: i64) -> String {
    format!("{:04}", cid)
}

/// Data required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub permission: Permission,
}

/// Typed partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub qq: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub permission: Option<Permission>,
    pub banned: Option<bool>,
    pub banned_until: Option<Option<DateTime<Utc>>>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.qq.is_none()
            && self.password_hash.is_none()
            && self.permission.is_none()
            && self.banned.is_none()
            && self.banned_until.is_none()
            && self.last_login_time.is_none()
            && self.last_login_ip.is_none()
    }

    /// Fields that clear a ban, merged into whatever else is being written.
    pub fn clear_ban(mut self) -> Self {
        self.banned = Some(false);
        self.banned_until = Some(None);
        self
    }

    /// Apply to an in-memory copy so callers and fakes see the same result
    /// the database would.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.username {
            user.username = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = v.clone();
        }
        if let Some(v) = &self.qq {
            user.qq = v.clone();
        }
        if let Some(v) = &self.password_hash {
            user.password_hash = v.clone();
        }
        if let Some(v) = self.permission {
            user.permission = v;
        }
        if let Some(v) = self.banned {
            user.banned = v;
        }
        if let Some(v) = self.banned_until {
            user.banned_until = v;
        }
        if let Some(v) = self.last_login_time {
            user.last_login_time = Some(v);
        }
        if let Some(v) = &self.last_login_ip {
            user.last_login_ip = Some(v.clone());
        }
    }
}

/// Stored values a conditional write expects to find. `None` fields are
/// not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserGuard {
    pub permission: Option<Permission>,
    pub banned: Option<bool>,
    pub banned_until: Option<Option<DateTime<Utc>>>,
}

impl UserGuard {
    /// Expect the permission mask read before planning an edit.
    pub fn permission(permission: Permission) -> Self {
        Self {
            permission: Some(permission),
            ..Default::default()
        }
    }

    /// Expect the ban state the user was loaded with.
    pub fn ban_of(user: &User) -> Self {
        Self {
            banned: Some(user.banned),
            banned_until: Some(user.banned_until),
            ..Default::default()
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.permission.map_or(true, |p| p == user.permission)
            && self.banned.map_or(true, |b| b == user.banned)
            && self.banned_until.map_or(true, |u| u == user.banned_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_with_roles(own: Permission, roles: &[Permission]) -> User {
        let now = Utc::now();
        User {
            id: 1,
            cid: 42,
            username: "pilot".into(),
            email: "pilot@example.com".into(),
            password_hash: String::new(),
            qq: None,
            permission: own,
            banned: false,
            banned_until: None,
            last_login_time: None,
            last_login_ip: None,
            roles: roles
                .iter()
                .enumerate()
                .map(|(i, p)| Role {
                    id: i as i64 + 1,
                    name: format!("role-{i}"),
                    description: String::new(),
                    permission: *p,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn effective_permission_ignores_role_order() {
        let own = Permission::ADMIN_ENTRY;
        let a = Permission::USER_BAN;
        let b = Permission::ROLE_EDIT | Permission::ROLE_CREATE;
        let c = Permission::FSD_OBSERVER;

        let forward = user_with_roles(own, &[a, b, c]).effective_permission();
        let reversed = user_with_roles(own, &[c, b, a]).effective_permission();

        assert_eq!(forward, reversed);
        assert_eq!(forward, own | a | b | c);
    }

    #[test]
    fn expired_ban_is_lifted() {
        let now = Utc::now();
        let mut user = user_with_roles(Permission::NONE, &[]);
        user.banned = true;
        user.banned_until = Some(now - Duration::seconds(1));

        assert!(user.lift_expired_ban(now));
        assert_eq!(user.account_state(), AccountState::Active);
        assert!(user.banned_until.is_none());
    }

    #[test]
    fn ban_ending_exactly_now_is_lifted() {
        let now = Utc::now();
        let mut user = user_with_roles(Permission::NONE, &[]);
        user.banned = true;
        user.banned_until = Some(now);
        assert!(user.lift_expired_ban(now));
    }

    #[test]
    fn future_and_permanent_bans_stay() {
        let now = Utc::now();
        let mut timed = user_with_roles(Permission::NONE, &[]);
        timed.banned = true;
        timed.banned_until = Some(now + Duration::hours(1));
        assert!(!timed.lift_expired_ban(now));

        let mut permanent = user_with_roles(Permission::NONE, &[]);
        permanent.banned = true;
        assert!(!permanent.lift_expired_ban(now));
        assert_eq!(permanent.account_state(), AccountState::Banned { until: None });
    }

    #[test]
    fn cid_is_zero_padded() {
        assert_eq!(format_cid(7), "0007");
        assert_eq!(format_cid(12345), "12345");
    }

    #[test]
    fn clear_ban_keeps_other_fields() {
        let update = UserUpdate {
            last_login_ip: Some("10.0.0.1".into()),
            ..Default::default()
        }
        .clear_ban();
        assert_eq!(update.banned, Some(false));
        assert_eq!(update.banned_until, Some(None));
        assert!(update.last_login_ip.is_some());
    }

    #[test]
    fn guard_checks_only_given_fields() {
        let mut user = user_with_roles(Permission::USER_BAN, &[]);
        user.banned = true;
        user.banned_until = Some(Utc::now());

        assert!(UserGuard::default().matches(&user));
        assert!(UserGuard::permission(Permission::USER_BAN).matches(&user));
        assert!(!UserGuard::permission(Permission::NONE).matches(&user));

        let guard = UserGuard::ban_of(&user);
        assert!(guard.matches(&user));
        user.banned_until = None;
        assert!(!guard.matches(&user));
    }
}
