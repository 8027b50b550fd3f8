use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Permission node not found: {0}")]
    PermissionNodeNotFound(String),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User is banned until {}", .until.format("%Y-%m-%d %H:%M:%S"))]
    Banned { until: DateTime<Utc> },

    #[error("User is banned permanently")]
    BannedPermanently,

    #[error("Email, username or cid already registered")]
    IdentityTaken,

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Role {0} still has users")]
    RoleHasUsers(i64),

    #[error("New password must differ from the old one")]
    SamePassword,

    #[error("Old password is incorrect")]
    OldPasswordMismatch,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Verification code invalid")]
    CodeInvalid,

    #[error("Too many requests: {0}")]
    RateLimited(String),

    #[error("Downstream service error: {0}")]
    Downstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Stable machine-readable code returned to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_PARAM",
            Self::PermissionDenied => "NO_PERMISSION",
            Self::PermissionNodeNotFound(_) => "PERMISSION_NODE_NOT_FOUND",
            Self::NotFound { entity: "User", .. } => "USER_NOT_FOUND",
            Self::NotFound { entity: "Role", .. } => "ROLE_NOT_FOUND",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidCredentials => "USERNAME_OR_PASSWORD_ERROR",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::Banned { .. } => "USER_BANNED",
            Self::BannedPermanently => "USER_BANNED_PERMANENTLY",
            Self::IdentityTaken => "USER_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::RoleHasUsers(_) => "ROLE_HAS_USERS",
            Self::SamePassword => "SAME_PASSWORD",
            Self::OldPasswordMismatch => "OLD_PASSWORD_ERROR",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::CodeInvalid => "CODE_INVALID",
            Self::RateLimited(_) => "TOO_MANY_REQUESTS",
            Self::Downstream(_) => "DOWNSTREAM_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "SERVER_ERROR",
        }
    }

    /// Message safe to show to API callers. Storage and internal
    /// failures are reduced to a generic text.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Server error".to_string(),
            Self::Downstream(_) => "Verification service unavailable".to_string(),
            other => other.to_string(),
        }
    }

    /// Server-side failures are logged with context by the caller.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Downstream(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<InfraError> for DomainError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Database(e) => DomainError::Database(e.to_string()),
            other => DomainError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_code_depends_on_entity() {
        assert_eq!(DomainError::not_found("User", "id", 3).code(), "USER_NOT_FOUND");
        assert_eq!(DomainError::not_found("Role", "id", 3).code(), "ROLE_NOT_FOUND");
    }

    #[test]
    fn database_detail_is_not_public() {
        let err = DomainError::Database("no such table: users".into());
        assert_eq!(err.public_message(), "Server error");
        assert!(err.is_server_error());
    }

    #[test]
    fn taken_identity_is_not_a_registration_code() {
        let err = DomainError::IdentityTaken;
        assert_eq!(err.code(), "USER_EXISTS");
        assert_ne!(err.code(), crate::domain::AuditEventKind::UserRegistered.as_str());
        assert!(!err.is_server_error());
    }
}
