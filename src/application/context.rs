use crate::application::ports::TokenClaims;
use crate::domain::user::format_cid;
use crate::domain::Permission;
use crate::shared::{DomainError, DomainResult};

/// Transport metadata attached to every command
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

impl ClientMeta {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Authenticated caller of a command, with the permission snapshot taken
/// when its access token was issued.
#[derive(Debug, Clone)]
pub struct Actor {
    pub uid: i64,
    pub cid: i64,
    pub permission: Permission,
    pub meta: ClientMeta,
}

impl Actor {
    pub fn new(uid: i64, cid: i64, permission: Permission, meta: ClientMeta) -> Self {
        Self {
            uid,
            cid,
            permission,
            meta,
        }
    }

    pub fn from_claims(claims: &TokenClaims, meta: ClientMeta) -> Self {
        Self::new(
            claims.uid,
            claims.cid,
            Permission::from_bits(claims.permission),
            meta,
        )
    }

    pub fn require(&self, node: Permission) -> DomainResult<()> {
        if self.permission.has(node) {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied)
        }
    }

    /// Audit subject string for this actor.
    pub fn subject(&self) -> String {
        format_cid(self.cid)
    }
}
