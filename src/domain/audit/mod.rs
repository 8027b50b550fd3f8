//! Audit records emitted after successful mutations

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    UserRegistered,
    UserResetPassword,
    UserInformationEdit,
    UserBan,
    UserUnban,
    UserPermissionGrant,
    UserPermissionRevoke,
    RolePermissionGrant,
    RolePermissionRevoke,
    RoleGrant,
    RoleRevoke,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegistered => "USER_REGISTERED",
            Self::UserResetPassword => "USER_RESET_PASSWORD",
            Self::UserInformationEdit => "USER_INFORMATION_EDIT",
            Self::UserBan => "USER_BAN",
            Self::UserUnban => "USER_UNBAN",
            Self::UserPermissionGrant => "USER_PERMISSION_GRANT",
            Self::UserPermissionRevoke => "USER_PERMISSION_REVOKE",
            Self::RolePermissionGrant => "ROLE_PERMISSION_GRANT",
            Self::RolePermissionRevoke => "ROLE_PERMISSION_REVOKE",
            Self::RoleGrant => "ROLE_GRANT",
            Self::RoleRevoke => "ROLE_REVOKE",
            Self::RoleCreated => "ROLE_CREATED",
            Self::RoleUpdated => "ROLE_UPDATED",
            Self::RoleDeleted => "ROLE_DELETED",
        }
    }
}

/// Immutable once built. `subject` is the acting user's call-sign and
/// `object` describes the affected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event: AuditEventKind,
    pub subject: String,
    pub object: String,
    pub ip: String,
    pub user_agent: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event: AuditEventKind,
        subject: impl Into<String>,
        object: impl Into<String>,
        ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            event,
            subject: subject.into(),
            object: object.into(),
            ip: ip.into(),
            user_agent: user_agent.into(),
            old_value: None,
            new_value: None,
        }
    }

    pub fn with_old_value(mut self, value: impl Into<String>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn with_new_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_like_its_name() {
        for kind in [AuditEventKind::UserPermissionGrant, AuditEventKind::RoleDeleted] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
