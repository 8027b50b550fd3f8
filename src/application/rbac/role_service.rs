//! Role catalogue: listing, creation, renaming and deletion

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::context::Actor;
use crate::application::side_effects::SideEffects;
use crate::domain::{
    AuditEvent, AuditEventKind, NewRole, Permission, Role, RoleRepository, RoleUpdate, User,
};
use crate::shared::{DomainError, DomainResult, PageRequest, PaginatedResult};

const ROLE_AUDIT_DEADLINE: Duration = Duration::from_secs(5);

/// A role together with its members
#[derive(Debug, Clone)]
pub struct RoleDetail {
    pub role: Role,
    pub users: Vec<User>,
}

fn describe(name: &str, description: &str) -> String {
    format!("{}({})", name, description)
}

pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    side_effects: SideEffects,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleRepository>, side_effects: SideEffects) -> Self {
        Self {
            roles,
            side_effects,
        }
    }

    fn emit(&self, operation: &'static str, event: AuditEvent) {
        let fx = self.side_effects.clone();
        self.side_effects.spawn(operation, ROLE_AUDIT_DEADLINE, async move {
            fx.audit(event).await;
        });
    }

    pub async fn get_pages(&self, actor: &Actor, page: &PageRequest) -> DomainResult<PaginatedResult<Role>> {
        actor.require(Permission::ROLE_SHOW_LIST)?;
        self.roles.get_pages(page).await
    }

    pub async fn get_role(&self, actor: &Actor, id: i64) -> DomainResult<RoleDetail> {
        actor.require(Permission::ROLE_SHOW_LIST)?;
        let role = self.roles.get_by_id(id).await?;
        let users = self.roles.get_role_users(id).await?;
        Ok(RoleDetail { role, users })
    }

    pub async fn create(&self, actor: &Actor, name: &str, description: &str) -> DomainResult<Role> {
        actor.require(Permission::ROLE_CREATE)?;
        if name.trim().is_empty() {
            return Err(DomainError::Validation("role name is required".into()));
        }

        let role = self
            .roles
            .save(NewRole {
                name: name.trim().to_string(),
                description: description.to_string(),
                permission: Permission::NONE,
            })
            .await?;
        info!(role_id = role.id, name = %role.name, operator = actor.uid, "Role created");

        self.emit(
            "create_role",
            AuditEvent::new(
                AuditEventKind::RoleCreated,
                actor.subject(),
                role.id.to_string(),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            )
            .with_new_value(describe(&role.name, &role.description)),
        );
        Ok(role)
    }

    /// Rename / re-describe a role. Submitting the current values is a
    /// successful no-op and is not audited.
    pub async fn update(&self, actor: &Actor, id: i64, name: &str, description: &str) -> DomainResult<Role> {
        actor.require(Permission::ROLE_EDIT)?;
        if name.trim().is_empty() {
            return Err(DomainError::Validation("role name is required".into()));
        }
        let mut role = self.roles.get_by_id(id).await?;
        let name = name.trim();

        if role.name == name && role.description == description {
            info!(role_id = id, operator = actor.uid, "Role update without changes");
            return Ok(role);
        }

        let old_value = describe(&role.name, &role.description);
        let update = RoleUpdate {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            permission: None,
        };
        self.roles.update(id, &update).await?;
        update.apply_to(&mut role);
        info!(role_id = id, operator = actor.uid, "Role updated");

        self.emit(
            "update_role",
            AuditEvent::new(
                AuditEventKind::RoleUpdated,
                actor.subject(),
                id.to_string(),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            )
            .with_old_value(old_value)
            .with_new_value(describe(&role.name, &role.description)),
        );
        Ok(role)
    }

    /// Delete a role. Members block deletion unless `force` is set.
    pub async fn delete(&self, actor: &Actor, id: i64, force: bool) -> DomainResult<()> {
        actor.require(Permission::ROLE_DELETE)?;
        let role = self.roles.get_by_id(id).await?;

        self.roles.delete(id, force).await?;
        info!(role_id = id, operator = actor.uid, force, "Role deleted");

        self.emit(
            "delete_role",
            AuditEvent::new(
                AuditEventKind::RoleDeleted,
                actor.subject(),
                id.to_string(),
                actor.meta.ip.clone(),
                actor.meta.user_agent.clone(),
            )
            .with_old_value(describe(&role.name, &role.description)),
        );
        Ok(())
    }
}
