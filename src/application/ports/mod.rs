//! Application ports (hexagonal architecture boundaries)
//!
//! Repository traits live next to their aggregates in `domain`; the
//! collaborators below are the engine's outbound dependencies.

pub mod outbound;

pub use outbound::{
    AuditLogClient, Banned, CodeStatus, CollaboratorError, EmailChange, EmailCodeVerifier,
    NotificationClient, PasswordNotice, PermissionChange, RoleChange, TokenClaims, TokenIssuer,
    TokenKind, Unbanned, Welcome,
};
