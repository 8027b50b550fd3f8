//! Outbound ports: collaborators the account engine calls out to
//!
//! Audit storage, e-mail delivery, e-mail code verification and token
//! signing all live outside the engine. Adapters are in
//! `infrastructure::clients` and `infrastructure::crypto`.

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AuditEvent, User};
use crate::shared::DomainResult;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

// ── Audit log ──────────────────────────────────────────────────

#[async_trait]
pub trait AuditLogClient: Send + Sync {
    async fn log(&self, event: AuditEvent) -> Result<(), CollaboratorError>;
}

// ── E-mail notifications ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Welcome {
    pub target_email: String,
    pub cid: String,
}

/// Shared by password reset and password change notices
#[derive(Debug, Clone, Serialize)]
pub struct PasswordNotice {
    pub target_email: String,
    pub cid: String,
    pub time: String,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailChange {
    /// Old address; the notice goes to the mailbox that lost the account.
    pub target_email: String,
    pub cid: String,
    pub new_email: String,
    pub time: String,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionChange {
    pub target_email: String,
    pub cid: String,
    pub permissions: String,
    pub operator: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleChange {
    pub target_emails: Vec<String>,
    pub cid: String,
    pub roles: String,
    pub operator: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Banned {
    pub target_email: String,
    pub cid: String,
    pub reason: String,
    pub until: String,
    pub operator: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Unbanned {
    pub target_email: String,
    pub cid: String,
    pub operator: String,
    pub contact: String,
}

#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send_welcome(&self, mail: Welcome) -> Result<(), CollaboratorError>;
    async fn send_password_reset(&self, mail: PasswordNotice) -> Result<(), CollaboratorError>;
    async fn send_password_change(&self, mail: PasswordNotice) -> Result<(), CollaboratorError>;
    async fn send_email_change(&self, mail: EmailChange) -> Result<(), CollaboratorError>;
    async fn send_permission_change(&self, mail: PermissionChange) -> Result<(), CollaboratorError>;
    async fn send_role_change(&self, mail: RoleChange) -> Result<(), CollaboratorError>;
    async fn send_banned(&self, mail: Banned) -> Result<(), CollaboratorError>;
    async fn send_unbanned(&self, mail: Unbanned) -> Result<(), CollaboratorError>;
}

// ── E-mail verification codes ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStatus {
    Valid,
    Expired,
    Invalid,
    Error,
}

#[async_trait]
pub trait EmailCodeVerifier: Send + Sync {
    async fn verify_code(&self, email: &str, code: &str) -> Result<CodeStatus, CollaboratorError>;
    async fn remove_code(&self, email: &str) -> Result<(), CollaboratorError>;
}

// ── Tokens ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Fsd,
}

/// JWT claims. `permission` is the effective permission at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub uid: i64,
    pub cid: i64,
    pub username: String,
    pub permission: u64,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub trait TokenIssuer: Send + Sync {
    fn create_claim(&self, user: &User, kind: TokenKind) -> TokenClaims;
    fn generate_key(&self, claims: &TokenClaims) -> DomainResult<String>;
    fn verify(&self, token: &str) -> DomainResult<TokenClaims>;
    fn access_token_ttl(&self) -> Duration;
}
