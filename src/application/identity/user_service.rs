//! User management service: application-layer orchestration
//!
//! Registration, profile edits, password flows and bans. HTTP handlers are
//! thin wrappers that delegate here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::application::context::{Actor, ClientMeta};
use crate::application::ports::{
    Banned, CodeStatus, EmailChange, PasswordNotice, Unbanned, Welcome,
};
use crate::application::side_effects::{load_operator, report, SideEffects};
use crate::domain::user::MAX_BAN_SECONDS;
use crate::domain::{AuditEvent, AuditEventKind, NewUser, Permission, User, UserRepository, UserUpdate};
use crate::infrastructure::crypto::{hash_password, verify_password};
use crate::shared::{DomainError, DomainResult, PageRequest, PaginatedResult};

const CODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub code: String,
}

/// Fields a user may change on their own account
#[derive(Debug, Clone, Default)]
pub struct SelfUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Required when `email` changes; verified against the new address.
    pub email_code: Option<String>,
    pub qq: Option<String>,
}

/// Fields an administrator may change on any account
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub qq: Option<String>,
    pub password: Option<String>,
}

fn changed<'a>(requested: &'a Option<String>, current: &str) -> Option<&'a String> {
    requested
        .as_ref()
        .filter(|v| !v.trim().is_empty() && v.as_str() != current)
}

/// End of a timed ban starting now, `None` for a permanent one.
fn ban_end(seconds: i64) -> DomainResult<Option<DateTime<Utc>>> {
    if seconds <= 0 {
        return Ok(None);
    }
    if seconds > MAX_BAN_SECONDS {
        return Err(DomainError::Validation(format!(
            "ban duration must not exceed {MAX_BAN_SECONDS} seconds"
        )));
    }
    chrono::Duration::try_seconds(seconds)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .map(Some)
        .ok_or_else(|| DomainError::Validation("ban duration out of range".into()))
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    side_effects: SideEffects,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, side_effects: SideEffects, bcrypt_cost: u32) -> Self {
        Self {
            users,
            side_effects,
            bcrypt_cost,
        }
    }

    async fn verify_email_code(&self, email: &str, code: &str) -> DomainResult<()> {
        let checked = tokio::time::timeout(
            CODE_CHECK_TIMEOUT,
            self.side_effects.codes().verify_code(email, code),
        )
        .await;

        match checked {
            Ok(Ok(CodeStatus::Valid)) => Ok(()),
            Ok(Ok(CodeStatus::Expired)) => Err(DomainError::CodeExpired),
            Ok(Ok(CodeStatus::Invalid)) => Err(DomainError::CodeInvalid),
            Ok(Ok(CodeStatus::Error)) => {
                error!(email, "Email code service reported an error");
                Err(DomainError::Downstream("code verification failed".into()))
            }
            Ok(Err(e)) => {
                error!(email, error = %e, "Email code verification failed");
                Err(DomainError::Downstream(e.to_string()))
            }
            Err(_) => {
                error!(email, "Email code verification timed out");
                Err(DomainError::Downstream("code verification timed out".into()))
            }
        }
    }

    // ── Registration & recovery ─────────────────────────────────

    pub async fn register(&self, cmd: RegisterUser, meta: ClientMeta) -> DomainResult<User> {
        if cmd.cid <= 0 || cmd.username.trim().is_empty() || cmd.email.trim().is_empty() {
            return Err(DomainError::Validation("cid, username and email are required".into()));
        }

        let available = self
            .users
            .is_identity_available(Some(cmd.cid), Some(&cmd.username), Some(&cmd.email))
            .await?;
        if !available {
            return Err(DomainError::IdentityTaken);
        }

        self.verify_email_code(&cmd.email, &cmd.code).await?;

        let user = self
            .users
            .save(NewUser {
                cid: cmd.cid,
                username: cmd.username,
                email: cmd.email,
                password_hash: hash_password(&cmd.password, self.bcrypt_cost)?,
                permission: Permission::NONE,
            })
            .await?;

        info!(user_id = user.id, cid = user.cid, username = %user.username, "New user registered");

        let fx = self.side_effects.clone();
        let (email, cid) = (user.email.clone(), user.display_cid());
        let object = format!("{}({})", user.username, user.email);
        self.side_effects.spawn("register", Duration::from_secs(15), async move {
            report(
                "welcome",
                fx.notifier()
                    .send_welcome(Welcome {
                        target_email: email.clone(),
                        cid: cid.clone(),
                    })
                    .await,
            );
            fx.audit(AuditEvent::new(
                AuditEventKind::UserRegistered,
                cid,
                object,
                meta.ip,
                meta.user_agent,
            ))
            .await;
            fx.remove_code(&email).await;
        });

        Ok(user)
    }

    /// True when none of the supplied identity fields is in use.
    pub async fn check_availability(
        &self,
        cid: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> DomainResult<bool> {
        if cid.is_none() && username.is_none() && email.is_none() {
            return Err(DomainError::Validation("at least one field is required".into()));
        }
        self.users.is_identity_available(cid, username, email).await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
        meta: ClientMeta,
    ) -> DomainResult<()> {
        self.verify_email_code(email, code).await?;

        let user = self.users.get_by_username_or_email(email).await?;
        let update = UserUpdate {
            password_hash: Some(hash_password(password, self.bcrypt_cost)?),
            ..Default::default()
        };
        self.users.update(user.id, &update).await?;

        info!(user_id = user.id, "Password reset");

        let fx = self.side_effects.clone();
        let email = email.to_string();
        self.side_effects.spawn("reset_password", Duration::from_secs(10), async move {
            fx.audit(AuditEvent::new(
                AuditEventKind::UserResetPassword,
                user.display_cid(),
                format!("{}({})", user.username, user.email),
                meta.ip.clone(),
                meta.user_agent.clone(),
            ))
            .await;
            report(
                "password_reset",
                fx.notifier()
                    .send_password_reset(PasswordNotice {
                        target_email: email.clone(),
                        cid: user.display_cid(),
                        time: Utc::now().to_rfc3339(),
                        ip: meta.ip,
                        user_agent: meta.user_agent,
                    })
                    .await,
            );
            fx.remove_code(&email).await;
        });

        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn get_pages(&self, actor: &Actor, page: &PageRequest) -> DomainResult<PaginatedResult<User>> {
        actor.require(Permission::USER_SHOW_LIST)?;
        self.users.get_pages(page).await
    }

    pub async fn get_self(&self, actor: &Actor) -> DomainResult<User> {
        self.users.get_by_id(actor.uid).await
    }

    pub async fn get_user(&self, actor: &Actor, id: i64) -> DomainResult<User> {
        actor.require(Permission::USER_SHOW_LIST)?;
        self.users.get_by_id(id).await
    }

    // ── Profile updates ─────────────────────────────────────────

    pub async fn update_self(&self, actor: &Actor, data: SelfUpdate) -> DomainResult<User> {
        let user = self.users.get_by_id(actor.uid).await?;
        let mut update = UserUpdate::default();
        let mut old_email = None;

        if let Some(username) = changed(&data.username, &user.username) {
            update.username = Some(username.clone());
        }
        if let Some(email) = changed(&data.email, &user.email) {
            let code = data
                .email_code
                .as_deref()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| DomainError::Validation("email code is required".into()))?;
            self.verify_email_code(email, code).await?;
            old_email = Some(user.email.clone());
            update.email = Some(email.clone());
        }
        if let Some(qq) = changed(&data.qq, user.qq.as_deref().unwrap_or("")) {
            update.qq = Some(Some(qq.clone()));
        }

        if update.is_empty() {
            return Err(DomainError::Validation("nothing to update".into()));
        }
        self.users.update(user.id, &update).await?;
        let user = self.users.get_by_id(user.id).await?;
        info!(user_id = user.id, "Profile updated");

        if let Some(old_email) = old_email {
            let fx = self.side_effects.clone();
            let (cid, new_email) = (user.display_cid(), user.email.clone());
            let meta = actor.meta.clone();
            self.side_effects.spawn("update_self", Duration::from_secs(5), async move {
                report(
                    "email_change",
                    fx.notifier()
                        .send_email_change(EmailChange {
                            target_email: old_email,
                            cid,
                            new_email: new_email.clone(),
                            time: Utc::now().to_rfc3339(),
                            ip: meta.ip,
                            user_agent: meta.user_agent,
                        })
                        .await,
                );
                fx.remove_code(&new_email).await;
            });
        }

        Ok(user)
    }

    pub async fn update_user(&self, actor: &Actor, id: i64, data: AdminUserUpdate) -> DomainResult<()> {
        actor.require(Permission::USER_EDIT_INFO)?;
        let user = self.users.get_by_id(id).await?;

        let mut update = UserUpdate::default();
        let mut old_value = Map::new();
        let mut new_value = Map::new();

        if let Some(username) = changed(&data.username, &user.username) {
            old_value.insert("username".into(), json!(user.username));
            new_value.insert("username".into(), json!(username));
            update.username = Some(username.clone());
        }
        if let Some(email) = changed(&data.email, &user.email) {
            old_value.insert("email".into(), json!(user.email));
            new_value.insert("email".into(), json!(email));
            update.email = Some(email.clone());
        }
        if let Some(qq) = changed(&data.qq, user.qq.as_deref().unwrap_or("")) {
            old_value.insert("qq".into(), json!(user.qq));
            new_value.insert("qq".into(), json!(qq));
            update.qq = Some(Some(qq.clone()));
        }
        if let Some(password) = data.password.as_deref().filter(|p| !p.is_empty()) {
            update.password_hash = Some(hash_password(password, self.bcrypt_cost)?);
        }

        if update.is_empty() {
            return Err(DomainError::Validation("nothing to update".into()));
        }
        self.users.update(user.id, &update).await?;
        info!(user_id = user.id, operator = actor.uid, "User information edited");

        let fx = self.side_effects.clone();
        let event = AuditEvent::new(
            AuditEventKind::UserInformationEdit,
            actor.subject(),
            user.display_cid(),
            actor.meta.ip.clone(),
            actor.meta.user_agent.clone(),
        )
        .with_old_value(Value::Object(old_value).to_string())
        .with_new_value(Value::Object(new_value).to_string());
        self.side_effects.spawn("update_user", Duration::from_secs(15), async move {
            fx.audit(event).await;
        });

        Ok(())
    }

    pub async fn update_password(&self, actor: &Actor, old: &str, new: &str) -> DomainResult<()> {
        let user = self.users.get_by_id(actor.uid).await?;
        if !verify_password(old, &user.password_hash) {
            warn!(user_id = user.id, "Password change rejected: old password mismatch");
            return Err(DomainError::OldPasswordMismatch);
        }
        if old == new {
            return Err(DomainError::SamePassword);
        }

        let update = UserUpdate {
            password_hash: Some(hash_password(new, self.bcrypt_cost)?),
            ..Default::default()
        };
        self.users.update(user.id, &update).await?;
        info!(user_id = user.id, "Password changed");

        let fx = self.side_effects.clone();
        let meta = actor.meta.clone();
        self.side_effects.spawn("update_password", Duration::from_secs(5), async move {
            report(
                "password_change",
                fx.notifier()
                    .send_password_change(PasswordNotice {
                        target_email: user.email.clone(),
                        cid: user.display_cid(),
                        time: Utc::now().to_rfc3339(),
                        ip: meta.ip,
                        user_agent: meta.user_agent,
                    })
                    .await,
            );
        });

        Ok(())
    }

    // ── Bans ────────────────────────────────────────────────────

    /// Ban a user. `seconds <= 0` bans permanently; timed bans are capped
    /// at `MAX_BAN_SECONDS`.
    pub async fn ban(&self, actor: &Actor, id: i64, seconds: i64, reason: &str) -> DomainResult<()> {
        actor.require(Permission::USER_BAN)?;
        let until = ban_end(seconds)?;
        let user = self.users.get_by_id(id).await?;

        let update = UserUpdate {
            banned: Some(true),
            banned_until: Some(until),
            ..Default::default()
        };
        self.users.update(user.id, &update).await?;
        info!(user_id = user.id, operator = actor.uid, permanent = until.is_none(), "User banned");

        let fx = self.side_effects.clone();
        let users = self.users.clone();
        let actor = actor.clone();
        let reason = reason.to_string();
        self.side_effects.spawn("ban", Duration::from_secs(10), async move {
            let operator = load_operator(users.as_ref(), &actor).await;
            fx.audit(
                AuditEvent::new(
                    AuditEventKind::UserBan,
                    operator.cid.clone(),
                    user.display_cid(),
                    actor.meta.ip.clone(),
                    actor.meta.user_agent.clone(),
                )
                .with_new_value(reason.clone()),
            )
            .await;
            report(
                "banned",
                fx.notifier()
                    .send_banned(Banned {
                        target_email: user.email.clone(),
                        cid: user.display_cid(),
                        reason,
                        until: until.map_or_else(|| "permanent".to_string(), |t| t.to_rfc3339()),
                        operator: operator.cid,
                        contact: operator.contact,
                    })
                    .await,
            );
        });

        Ok(())
    }

    pub async fn unban(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        actor.require(Permission::USER_BAN)?;
        let user = self.users.get_by_id(id).await?;

        self.users.update(user.id, &UserUpdate::default().clear_ban()).await?;
        info!(user_id = user.id, operator = actor.uid, "User unbanned");

        let fx = self.side_effects.clone();
        let users = self.users.clone();
        let actor = actor.clone();
        self.side_effects.spawn("unban", Duration::from_secs(10), async move {
            let operator = load_operator(users.as_ref(), &actor).await;
            fx.audit(AuditEvent::new(
                AuditEventKind::UserUnban,
                operator.cid.clone(),
                user.display_cid(),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            ))
            .await;
            report(
                "unbanned",
                fx.notifier()
                    .send_unbanned(Unbanned {
                        target_email: user.email.clone(),
                        cid: user.display_cid(),
                        operator: operator.cid,
                        contact: operator.contact,
                    })
                    .await,
            );
        });

        Ok(())
    }
}
