//! Named permission nodes
//!
//! The registry is built once at startup and shared through an `Arc`. API
//! callers address bits by name; names are resolved into typed changes
//! before any state is touched.

use std::collections::{BTreeMap, HashMap};

use super::model::Permission;
use crate::shared::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Grant,
    Revoke,
}

/// One resolved entry of a permission edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionChange {
    pub name: String,
    pub node: Permission,
    pub kind: ChangeKind,
}

/// Outcome of applying a change-set to a target mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEdit {
    pub before: Permission,
    pub after: Permission,
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    nodes: HashMap<String, Permission>,
}

impl PermissionRegistry {
    pub fn new(nodes: impl IntoIterator<Item = (String, Permission)>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Registry of every node this service knows about.
    pub fn builtin() -> Self {
        let nodes = [
            ("AdminEntry", Permission::ADMIN_ENTRY),
            ("UserShowList", Permission::USER_SHOW_LIST),
            ("UserEditInfo", Permission::USER_EDIT_INFO),
            ("UserEditPermission", Permission::USER_EDIT_PERMISSION),
            ("UserEditRole", Permission::USER_EDIT_ROLE),
            ("UserBan", Permission::USER_BAN),
            ("RoleShowList", Permission::ROLE_SHOW_LIST),
            ("RoleCreate", Permission::ROLE_CREATE),
            ("RoleEdit", Permission::ROLE_EDIT),
            ("RoleDelete", Permission::ROLE_DELETE),
            ("RoleEditPermission", Permission::ROLE_EDIT_PERMISSION),
            ("AuditLogShow", Permission::AUDIT_LOG_SHOW),
            ("FsdObserver", Permission::FSD_OBSERVER),
            ("FsdController", Permission::FSD_CONTROLLER),
            ("FsdSupervisor", Permission::FSD_SUPERVISOR),
        ];
        Self::new(nodes.into_iter().map(|(name, node)| (name.to_string(), node)))
    }

    pub fn lookup(&self, name: &str) -> DomainResult<Permission> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::PermissionNodeNotFound(name.to_string()))
    }

    /// Union of every registered node.
    pub fn all(&self) -> Permission {
        self.nodes.values().copied().collect()
    }

    /// Names of the registered nodes fully contained in `mask`, sorted.
    pub fn names_of(&self, mask: Permission) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.is_empty() && mask.has(**node))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolve `name -> grant?` pairs into typed changes. Any unknown name
    /// fails the whole set.
    pub fn resolve(&self, changes: &BTreeMap<String, bool>) -> DomainResult<Vec<PermissionChange>> {
        changes
            .iter()
            .map(|(name, grant)| {
                Ok(PermissionChange {
                    name: name.clone(),
                    node: self.lookup(name)?,
                    kind: if *grant {
                        ChangeKind::Grant
                    } else {
                        ChangeKind::Revoke
                    },
                })
            })
            .collect()
    }
}

/// Apply resolved changes to `target` on behalf of an actor holding
/// `actor`. The actor must hold every node it grants or revokes; the first
/// node it lacks rejects the whole edit.
pub fn apply_changes(
    actor: Permission,
    target: Permission,
    changes: &[PermissionChange],
) -> DomainResult<PermissionEdit> {
    let mut after = target;
    let mut granted = Vec::new();
    let mut revoked = Vec::new();

    for change in changes {
        if !actor.has(change.node) {
            return Err(DomainError::PermissionDenied);
        }
        match change.kind {
            ChangeKind::Grant => {
                after = after.grant(change.node);
                granted.push(change.name.clone());
            }
            ChangeKind::Revoke => {
                after = after.revoke(change.node);
                revoked.push(change.name.clone());
            }
        }
    }

    Ok(PermissionEdit {
        before: target,
        after,
        granted,
        revoked,
    })
}
