//! Permission-bit edits and role membership changes
//!
//! Every operation follows the same shape: check the actor, load and
//! validate targets, persist in one repository call, then detach the
//! audit and notification work. Mask edits are compare-and-set against
//! the mask they were planned from.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::context::Actor;
use crate::application::ports::{PermissionChange as PermissionMail, RoleChange};
use crate::application::side_effects::{bulk_deadline, load_operator, report, SideEffects};
use crate::domain::permission::{apply_changes, PermissionEdit};
use crate::domain::{
    AuditEvent, AuditEventKind, Permission, PermissionRegistry, Role, RoleRepository, User,
    UserGuard, UserRepository, UserUpdate,
};
use crate::shared::{DomainError, DomainResult};

/// Read-plan-write rounds before a contended mask edit gives up.
const EDIT_ATTEMPTS: usize = 5;

fn contended(entity: &str, id: i64) -> DomainError {
    DomainError::Conflict(format!("{entity} {id} permission changed concurrently"))
}

fn dedupe(ids: &[i64], what: &str) -> DomainResult<Vec<i64>> {
    let unique: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if unique.is_empty() {
        return Err(DomainError::Validation(format!("{what} must not be empty")));
    }
    Ok(unique)
}

fn missing<T>(entity: &'static str, wanted: &[i64], found: &[T], id_of: impl Fn(&T) -> i64) -> DomainError {
    let present: BTreeSet<i64> = found.iter().map(id_of).collect();
    let absent = wanted
        .iter()
        .filter(|id| !present.contains(id))
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    DomainError::not_found(entity, "id", absent)
}

/// "\n+a\n+b\n-c" as shown in the permission-change mail
fn permission_lines(edit: &PermissionEdit) -> String {
    let mut out = String::new();
    for name in &edit.granted {
        out.push_str("\n+");
        out.push_str(name);
    }
    for name in &edit.revoked {
        out.push_str("\n-");
        out.push_str(name);
    }
    out
}

fn role_lines(roles: &[Role], sign: char) -> String {
    roles.iter().map(|r| format!("\n{}{}", sign, r.name)).collect()
}

fn join_names(roles: &[Role]) -> String {
    roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(",")
}

fn join_cids(users: &[User]) -> String {
    users.iter().map(User::display_cid).collect::<Vec<_>>().join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Grant,
    Revoke,
}

impl Membership {
    fn audit_kind(self) -> AuditEventKind {
        match self {
            Membership::Grant => AuditEventKind::RoleGrant,
            Membership::Revoke => AuditEventKind::RoleRevoke,
        }
    }

    fn sign(self) -> char {
        match self {
            Membership::Grant => '+',
            Membership::Revoke => '-',
        }
    }

    fn describe(self, event: AuditEvent, value: String) -> AuditEvent {
        match self {
            Membership::Grant => event.with_new_value(value),
            Membership::Revoke => event.with_old_value(value),
        }
    }
}

pub struct PermissionService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    registry: Arc<PermissionRegistry>,
    side_effects: SideEffects,
}

impl PermissionService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        registry: Arc<PermissionRegistry>,
        side_effects: SideEffects,
    ) -> Self {
        Self {
            users,
            roles,
            registry,
            side_effects,
        }
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    fn plan(&self, actor: &Actor, target: Permission, changes: &BTreeMap<String, bool>) -> DomainResult<PermissionEdit> {
        if changes.is_empty() {
            return Err(DomainError::Validation("no permission changes supplied".into()));
        }
        let resolved = self.registry.resolve(changes)?;
        apply_changes(actor.permission, target, &resolved)
    }

    /// Plan against the stored mask and write it back only if nobody changed
    /// it in between; a lost race re-reads and plans again.
    async fn swap_user_mask(
        &self,
        actor: &Actor,
        user_id: i64,
        changes: &BTreeMap<String, bool>,
    ) -> DomainResult<(User, PermissionEdit)> {
        for _ in 0..EDIT_ATTEMPTS {
            let user = self.users.get_by_id(user_id).await?;
            let edit = self.plan(actor, user.permission, changes)?;
            let update = UserUpdate {
                permission: Some(edit.after),
                ..Default::default()
            };
            if self
                .users
                .update_if(user.id, &update, &UserGuard::permission(user.permission))
                .await?
            {
                return Ok((user, edit));
            }
            debug!(user_id, "User permission changed during edit, retrying");
        }
        Err(contended("user", user_id))
    }

    async fn swap_role_mask(
        &self,
        actor: &Actor,
        role_id: i64,
        changes: &BTreeMap<String, bool>,
    ) -> DomainResult<(Role, PermissionEdit)> {
        for _ in 0..EDIT_ATTEMPTS {
            let role = self.roles.get_by_id(role_id).await?;
            let edit = self.plan(actor, role.permission, changes)?;
            if self
                .roles
                .set_permission_if(role.id, role.permission, edit.after)
                .await?
            {
                return Ok((role, edit));
            }
            debug!(role_id, "Role permission changed during edit, retrying");
        }
        Err(contended("role", role_id))
    }

    /// Edit the direct permission bits of a user. The actor may only grant
    /// or revoke nodes it holds itself.
    pub async fn edit_user_permission(
        &self,
        actor: &Actor,
        user_id: i64,
        changes: &BTreeMap<String, bool>,
    ) -> DomainResult<Permission> {
        actor.require(Permission::USER_EDIT_PERMISSION)?;
        let (user, edit) = self.swap_user_mask(actor, user_id, changes).await?;
        info!(
            user_id = user.id,
            operator = actor.uid,
            before = edit.before.bits(),
            after = edit.after.bits(),
            "User permission edited"
        );

        let after = edit.after;
        let fx = self.side_effects.clone();
        let users = self.users.clone();
        let actor = actor.clone();
        self.side_effects.spawn("edit_user_permission", Duration::from_secs(15), async move {
            let operator = load_operator(users.as_ref(), &actor).await;
            let base = |kind| {
                AuditEvent::new(
                    kind,
                    operator.cid.clone(),
                    user.display_cid(),
                    actor.meta.ip.clone(),
                    actor.meta.user_agent.clone(),
                )
            };
            if !edit.granted.is_empty() {
                fx.audit(base(AuditEventKind::UserPermissionGrant).with_new_value(edit.granted.join(",")))
                    .await;
            }
            if !edit.revoked.is_empty() {
                fx.audit(base(AuditEventKind::UserPermissionRevoke).with_new_value(edit.revoked.join(",")))
                    .await;
            }
            report(
                "permission_change",
                fx.notifier()
                    .send_permission_change(PermissionMail {
                        target_email: user.email.clone(),
                        cid: user.display_cid(),
                        permissions: permission_lines(&edit),
                        operator: operator.cid.clone(),
                        contact: operator.contact.clone(),
                    })
                    .await,
            );
        });

        Ok(after)
    }

    /// Edit the permission bits a role confers. Audited only; members are
    /// not mailed.
    pub async fn edit_role_permission(
        &self,
        actor: &Actor,
        role_id: i64,
        changes: &BTreeMap<String, bool>,
    ) -> DomainResult<Permission> {
        actor.require(Permission::ROLE_EDIT_PERMISSION)?;
        let (role, edit) = self.swap_role_mask(actor, role_id, changes).await?;
        info!(
            role_id = role.id,
            operator = actor.uid,
            before = edit.before.bits(),
            after = edit.after.bits(),
            "Role permission edited"
        );

        let after = edit.after;
        let fx = self.side_effects.clone();
        let actor = actor.clone();
        self.side_effects.spawn("edit_role_permission", Duration::from_secs(10), async move {
            let object = format!("{}: {}", role.id, role.name);
            let base = |kind| {
                AuditEvent::new(
                    kind,
                    actor.subject(),
                    object.clone(),
                    actor.meta.ip.clone(),
                    actor.meta.user_agent.clone(),
                )
            };
            if !edit.granted.is_empty() {
                fx.audit(base(AuditEventKind::RolePermissionGrant).with_new_value(edit.granted.join(",")))
                    .await;
            }
            if !edit.revoked.is_empty() {
                fx.audit(base(AuditEventKind::RolePermissionRevoke).with_new_value(edit.revoked.join(",")))
                    .await;
            }
        });

        Ok(after)
    }

    pub async fn grant_user_role(&self, actor: &Actor, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.change_user_roles(actor, user_id, role_ids, Membership::Grant).await
    }

    pub async fn revoke_user_role(&self, actor: &Actor, user_id: i64, role_ids: &[i64]) -> DomainResult<()> {
        self.change_user_roles(actor, user_id, role_ids, Membership::Revoke).await
    }

    async fn change_user_roles(
        &self,
        actor: &Actor,
        user_id: i64,
        role_ids: &[i64],
        op: Membership,
    ) -> DomainResult<()> {
        actor.require(Permission::USER_EDIT_ROLE)?;
        let role_ids = dedupe(role_ids, "role list")?;
        let user = self.users.get_by_id(user_id).await?;
        let roles = self.roles.get_by_ids(&role_ids).await?;
        if roles.len() != role_ids.len() {
            return Err(missing("Role", &role_ids, &roles, |r| r.id));
        }

        match op {
            Membership::Grant => self.users.grant_roles(user.id, &role_ids).await?,
            Membership::Revoke => self.users.revoke_roles(user.id, &role_ids).await?,
        }
        info!(user_id = user.id, operator = actor.uid, roles = ?role_ids, ?op, "User roles changed");

        let fx = self.side_effects.clone();
        let users = self.users.clone();
        let actor = actor.clone();
        self.side_effects.spawn("change_user_roles", Duration::from_secs(10), async move {
            let operator = load_operator(users.as_ref(), &actor).await;
            let event = AuditEvent::new(
                op.audit_kind(),
                operator.cid.clone(),
                user.display_cid(),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            );
            fx.audit(op.describe(event, join_names(&roles))).await;
            report(
                "role_change",
                fx.notifier()
                    .send_role_change(RoleChange {
                        target_emails: vec![user.email.clone()],
                        cid: user.display_cid(),
                        roles: role_lines(&roles, op.sign()),
                        operator: operator.cid,
                        contact: operator.contact,
                    })
                    .await,
            );
        });

        Ok(())
    }

    pub async fn grant_role_user(&self, actor: &Actor, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.change_role_users(actor, role_id, user_ids, Membership::Grant).await
    }

    pub async fn revoke_role_user(&self, actor: &Actor, role_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        self.change_role_users(actor, role_id, user_ids, Membership::Revoke).await
    }

    async fn change_role_users(
        &self,
        actor: &Actor,
        role_id: i64,
        user_ids: &[i64],
        op: Membership,
    ) -> DomainResult<()> {
        actor.require(Permission::USER_EDIT_ROLE)?;
        let user_ids = dedupe(user_ids, "user list")?;
        let role = self.roles.get_by_id(role_id).await?;
        let members = self.users.get_by_ids(&user_ids).await?;
        if members.len() != user_ids.len() {
            return Err(missing("User", &user_ids, &members, |u| u.id));
        }

        match op {
            Membership::Grant => self.roles.grant_users(role.id, &user_ids).await?,
            Membership::Revoke => self.roles.revoke_users(role.id, &user_ids).await?,
        }
        info!(role_id = role.id, operator = actor.uid, users = ?user_ids, ?op, "Role members changed");

        let fx = self.side_effects.clone();
        let users = self.users.clone();
        let actor = actor.clone();
        let deadline = bulk_deadline(members.len());
        self.side_effects.spawn("change_role_users", deadline, async move {
            let operator = load_operator(users.as_ref(), &actor).await;
            let cids = join_cids(&members);
            let event = AuditEvent::new(
                op.audit_kind(),
                operator.cid.clone(),
                format!("{}: {}", role.name, role.id),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            );
            fx.audit(op.describe(event, cids.clone())).await;
            report(
                "role_change",
                fx.notifier()
                    .send_role_change(RoleChange {
                        target_emails: members.iter().map(|u| u.email.clone()).collect(),
                        cid: cids,
                        roles: format!("{}{}", op.sign(), role.name),
                        operator: operator.cid,
                        contact: operator.contact,
                    })
                    .await,
            );
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{actor_for, Fixture, Interleaved};
    use crate::infrastructure::clients::MailKind;

    fn service(fx: &Fixture) -> PermissionService {
        PermissionService::new(fx.users(), fx.roles(), fx.registry.clone(), fx.side_effects.clone())
    }

    fn changes(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn editor_mask() -> Permission {
        Permission::USER_EDIT_PERMISSION
            | Permission::ROLE_EDIT_PERMISSION
            | Permission::USER_EDIT_ROLE
            | Permission::USER_BAN
            | Permission::FSD_OBSERVER
    }

    #[tokio::test]
    async fn grant_then_revoke_restores_mask() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let target = fx.user(2, "target", "pw", Permission::FSD_OBSERVER).await;
        let svc = service(&fx);

        let after = svc
            .edit_user_permission(&editor, target.id, &changes(&[("UserBan", true)]))
            .await
            .unwrap();
        assert_eq!(after, Permission::FSD_OBSERVER | Permission::USER_BAN);
        let granted = fx.settle().await;

        svc.edit_user_permission(&editor, target.id, &changes(&[("UserBan", false)]))
            .await
            .unwrap();
        assert_eq!(fx.reload(target.id).await.permission, Permission::FSD_OBSERVER);
        let revoked = fx.settle().await;

        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].event, AuditEventKind::UserPermissionGrant);
        assert_eq!(granted[0].subject, "0001");
        assert_eq!(granted[0].object, "0002");
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].event, AuditEventKind::UserPermissionRevoke);

        let mails = fx.mailer.sent_of(MailKind::PermissionChange);
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].recipients, vec!["target@example.com".to_string()]);
        assert_eq!(mails[0].body["permissions"], "\n+UserBan");
    }

    #[tokio::test]
    async fn rejected_edit_leaves_mask_unchanged() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let target = fx.user(2, "target", "pw", Permission::FSD_OBSERVER).await;
        let svc = service(&fx);

        let err = svc
            .edit_user_permission(&editor, target.id, &changes(&[("UserBan", true), ("AdminEntry", true)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied));

        let err = svc
            .edit_user_permission(&editor, target.id, &changes(&[("UserBan", true), ("Teleport", true)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionNodeNotFound(_)));

        let err = svc
            .edit_user_permission(&editor, target.id, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        assert_eq!(fx.reload(target.id).await.permission, Permission::FSD_OBSERVER);
        assert!(fx.settle().await.is_empty());
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn edit_replans_when_mask_moves_underneath() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let target = fx.user(2, "target", "pw", Permission::NONE).await;
        let users = Arc::new(Interleaved::new(
            fx.users(),
            UserUpdate {
                permission: Some(Permission::FSD_OBSERVER),
                ..Default::default()
            },
        ));
        let svc = PermissionService::new(users, fx.roles(), fx.registry.clone(), fx.side_effects.clone());

        let after = svc
            .edit_user_permission(&editor, target.id, &changes(&[("UserBan", true)]))
            .await
            .unwrap();

        assert_eq!(after, Permission::FSD_OBSERVER | Permission::USER_BAN);
        assert_eq!(fx.reload(target.id).await.permission, after);
        let events = fx.settle().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_value.as_deref(), Some("UserBan"));
    }

    #[tokio::test]
    async fn concurrent_edits_on_sqlite_keep_both_bits() {
        use crate::domain::NewUser;
        use crate::infrastructure::database::repositories::test_support::memory_db;
        use crate::infrastructure::database::{SeaOrmRoleRepository, SeaOrmUserRepository};

        let fx = Fixture::new();
        let db = memory_db().await;
        let users: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db.clone()));
        let roles: Arc<dyn RoleRepository> = Arc::new(SeaOrmRoleRepository::new(db));
        let account = |cid: i64, permission| NewUser {
            cid,
            username: format!("user{cid}"),
            email: format!("user{cid}@example.com"),
            password_hash: "hash".into(),
            permission,
        };
        let editor = actor_for(&users.save(account(1, editor_mask())).await.unwrap());
        let target = users.save(account(2, Permission::NONE)).await.unwrap();
        let role = roles
            .save(crate::domain::NewRole {
                name: "observers".into(),
                description: String::new(),
                permission: Permission::NONE,
            })
            .await
            .unwrap();
        let svc = PermissionService::new(users.clone(), roles.clone(), fx.registry.clone(), fx.side_effects.clone());

        let ban = changes(&[("UserBan", true)]);
        let observe = changes(&[("FsdObserver", true)]);
        let (a, b, c, d) = tokio::join!(
            svc.edit_user_permission(&editor, target.id, &ban),
            svc.edit_user_permission(&editor, target.id, &observe),
            svc.edit_role_permission(&editor, role.id, &ban),
            svc.edit_role_permission(&editor, role.id, &observe),
        );
        for result in [a, b, c, d] {
            result.unwrap();
        }

        let both = Permission::USER_BAN | Permission::FSD_OBSERVER;
        assert_eq!(users.get_by_id(target.id).await.unwrap().permission, both);
        assert_eq!(roles.get_by_id(role.id).await.unwrap().permission, both);
    }

    #[tokio::test]
    async fn edit_needs_capability() {
        let fx = Fixture::new();
        let actor = actor_for(&fx.user(1, "plain", "pw", Permission::USER_BAN).await);
        let target = fx.user(2, "target", "pw", Permission::NONE).await;
        let err = service(&fx)
            .edit_user_permission(&actor, target.id, &changes(&[("UserBan", true)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied));
    }

    #[tokio::test]
    async fn role_permission_edit_reaches_members() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let member = fx.user(2, "member", "pw", Permission::NONE).await;
        let role = fx.role("observers", Permission::NONE).await;
        fx.store.grant_roles(member.id, &[role.id]).await.unwrap();

        service(&fx)
            .edit_role_permission(&editor, role.id, &changes(&[("FsdObserver", true)]))
            .await
            .unwrap();

        let member = fx.reload(member.id).await;
        assert_eq!(member.permission, Permission::NONE);
        assert!(member.effective_permission().has(Permission::FSD_OBSERVER));

        let events = fx.settle().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, AuditEventKind::RolePermissionGrant);
        assert_eq!(events[0].object, format!("{}: observers", role.id));
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn user_role_grant_is_all_or_nothing() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let target = fx.user(2, "target", "pw", Permission::NONE).await;
        let pilots = fx.role("pilots", Permission::FSD_OBSERVER).await;
        let svc = service(&fx);

        let err = svc
            .grant_user_role(&editor, target.id, &[pilots.id, 999])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Role", .. }));
        assert_eq!(fx.store.membership_count().await, 0);

        svc.grant_user_role(&editor, target.id, &[pilots.id, pilots.id]).await.unwrap();
        svc.grant_user_role(&editor, target.id, &[pilots.id]).await.unwrap();
        assert_eq!(fx.store.membership_count().await, 1);
        assert!(fx.reload(target.id).await.effective_permission().has(Permission::FSD_OBSERVER));
        let granted = fx.settle().await;
        assert_eq!(granted.len(), 2);
        assert!(granted.iter().all(|e| e.event == AuditEventKind::RoleGrant));
        assert_eq!(granted[0].new_value.as_deref(), Some("pilots"));

        svc.revoke_user_role(&editor, target.id, &[pilots.id]).await.unwrap();
        assert_eq!(fx.reload(target.id).await.effective_permission(), Permission::NONE);
        let revoked = fx.settle().await;
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].event, AuditEventKind::RoleRevoke);
        assert_eq!(revoked[0].old_value.as_deref(), Some("pilots"));

        let mails = fx.mailer.sent_of(MailKind::RoleChange);
        assert_eq!(mails.len(), 3);
        assert_eq!(mails[2].body["roles"], "\n-pilots");
    }

    #[tokio::test]
    async fn role_user_bulk_grant() {
        let mut fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let a = fx.user(20, "alpha", "pw", Permission::NONE).await;
        let b = fx.user(21, "bravo", "pw", Permission::NONE).await;
        let role = fx.role("atc", Permission::FSD_CONTROLLER).await;
        let svc = service(&fx);

        let err = svc.grant_role_user(&editor, role.id, &[a.id, 404]).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "User", .. }));
        assert_eq!(fx.store.membership_count().await, 0);

        assert!(matches!(
            svc.grant_role_user(&editor, role.id, &[]).await,
            Err(DomainError::Validation(_))
        ));

        svc.grant_role_user(&editor, role.id, &[a.id, b.id]).await.unwrap();
        assert_eq!(fx.store.membership_count().await, 2);

        let events = fx.settle().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object, format!("atc: {}", role.id));
        assert_eq!(events[0].new_value.as_deref(), Some("0020,0021"));

        let mails = fx.mailer.sent_of(MailKind::RoleChange);
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].recipients.len(), 2);
        assert_eq!(mails[0].body["roles"], "+atc");

        svc.revoke_role_user(&editor, role.id, &[b.id]).await.unwrap();
        assert_eq!(fx.store.membership_count().await, 1);
    }

    #[tokio::test]
    async fn effective_permission_ignores_role_order() {
        let fx = Fixture::new();
        let editor = actor_for(&fx.user(1, "editor", "pw", editor_mask()).await);
        let first = fx.user(2, "first", "pw", Permission::NONE).await;
        let second = fx.user(3, "second", "pw", Permission::NONE).await;
        let r1 = fx.role("one", Permission::FSD_OBSERVER).await;
        let r2 = fx.role("two", Permission::FSD_CONTROLLER).await;
        let svc = service(&fx);

        svc.grant_user_role(&editor, first.id, &[r1.id]).await.unwrap();
        svc.grant_user_role(&editor, first.id, &[r2.id]).await.unwrap();
        svc.grant_user_role(&editor, second.id, &[r2.id, r1.id]).await.unwrap();

        assert_eq!(
            fx.reload(first.id).await.effective_permission(),
            fx.reload(second.id).await.effective_permission()
        );
    }
}
